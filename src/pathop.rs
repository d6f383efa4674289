use notify::op::{self, Op};
use std::path::{Path, PathBuf};

/// What happened to a path, as far as rerunning is concerned
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ChangeKind {
    Modified,
    Created,
    Other,
}

impl ChangeKind {
    /// Classifies a raw `notify` op.
    ///
    /// A rename is reported for both ends of the move; only the end that
    /// exists afterwards (a file moved into place) counts as a creation.
    pub fn classify(path: &Path, op_: Op) -> Self {
        if op_.contains(op::CREATE) {
            Self::Created
        } else if Self::is_write(op_) || op_.contains(op::CHMOD) {
            Self::Modified
        } else if op_.contains(op::RENAME) && path.exists() {
            Self::Created
        } else {
            Self::Other
        }
    }

    fn is_write(op_: Op) -> bool {
        op_.intersects(op::WRITE | op::CLOSE_WRITE)
    }

    pub fn is_trigger(self) -> bool {
        match self {
            Self::Modified | Self::Created => true,
            Self::Other => false,
        }
    }
}

/// A changed path and what happened to it
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct PathOp {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl PathOp {
    pub fn new(path: &Path, op_: Op) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ChangeKind::classify(path, op_),
        }
    }
}
