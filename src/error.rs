use std::{error::Error as StdError, fmt, io, path::PathBuf, process::ExitStatus};

use crate::imports::ParseError;

pub type Result<T> = ::std::result::Result<T, Error>;

pub enum Error {
    Build(ExitStatus),
    Canonicalization(String, io::Error),
    Config(String),
    Io(io::Error),
    Notify(notify::Error),
    Parse(PathBuf, ParseError),
    Regex(String, regex::Error),
}

impl StdError for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        match err {
            notify::Error::Io(err) => Error::Io(err),
            other => Error::Notify(other),
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Config(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} error: {}",
            match self {
                Error::Build(_) => "Build",
                Error::Canonicalization(_, _) => "Path",
                Error::Config(_) => "Config",
                Error::Io(_) => "I/O",
                Error::Notify(_) => "Notify",
                Error::Parse(_, _) => "Parse",
                Error::Regex(_, _) => "Regex",
            },
            match self {
                Error::Build(status) => format!("build command failed ({})", status),
                Error::Canonicalization(path, err) => {
                    format!("couldn't canonicalize '{}':\n{}", path, err)
                }
                Error::Config(msg) => msg.clone(),
                Error::Io(err) => format!("{}", err),
                Error::Notify(err) => format!("{}", err),
                Error::Parse(path, err) => format!("{}: {}", path.display(), err),
                Error::Regex(pattern, err) => format!("invalid pattern '{}':\n{}", pattern, err),
            }
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
