//! Regex include/exclude rules for directories and changed files.
//!
//! Exclusion always wins: a path matching both an include and an exclude
//! rule is rejected.

use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

/// Directories to watch when no include rule is given.
pub const DEFAULT_DIR_INCLUDE: &str = ".*";
/// Directories to skip when no exclude rule is given. Only matches paths
/// made purely of dots.
pub const DEFAULT_DIR_EXCLUDE: &str = r"^\.*$";
/// Files whose change triggers a rerun when no include rule is given.
pub const DEFAULT_FILE_INCLUDE: &str = r"^(.*\.go|.*\.yaml|.*\.conf)$";

/// A compiled pattern along with the string it was compiled from.
#[derive(Clone, Debug)]
pub struct Rule {
    source: String,
    regex: Regex,
}

impl Rule {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::Regex(pattern.to_owned(), e))?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// An ordered set of rules; matches if any rule does.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| Rule::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        for rule in &rules {
            debug!("Adding rule: {}", rule.as_str());
        }

        Ok(Self { rules })
    }

    /// Compiles `patterns`, or `default` alone if there are none.
    pub fn compile_or<S: AsRef<str>>(patterns: &[S], default: &str) -> Result<Self> {
        if patterns.is_empty() {
            Self::compile(&[default])
        } else {
            Self::compile(patterns)
        }
    }

    /// Returns the first rule matching `haystack`.
    pub fn find(&self, haystack: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.is_match(haystack))
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.find(haystack).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// The four rule sets deciding what to watch and what to rerun on.
#[derive(Clone, Debug)]
pub struct FilterChain {
    include_dirs: RuleSet,
    exclude_dirs: RuleSet,
    include_files: RuleSet,
    exclude_files: RuleSet,
}

impl FilterChain {
    /// Compiles all patterns, substituting the defaults for empty
    /// include-dir, exclude-dir and include-file lists.
    pub fn new<S: AsRef<str>>(
        include_dirs: &[S],
        exclude_dirs: &[S],
        include_files: &[S],
        exclude_files: &[S],
    ) -> Result<Self> {
        Ok(Self {
            include_dirs: RuleSet::compile_or(include_dirs, DEFAULT_DIR_INCLUDE)?,
            exclude_dirs: RuleSet::compile_or(exclude_dirs, DEFAULT_DIR_EXCLUDE)?,
            include_files: RuleSet::compile_or(include_files, DEFAULT_FILE_INCLUDE)?,
            exclude_files: RuleSet::compile(exclude_files)?,
        })
    }

    /// Filter chain with every list left at its default.
    pub fn defaults() -> Result<Self> {
        let none: &[&str] = &[];
        Self::new(none, none, none, none)
    }

    pub fn should_watch_dir(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        if let Some(rule) = self.exclude_dirs.find(&path_str) {
            debug!("exclude: {} (matched {})", path_str, rule.as_str());
            return false;
        }

        self.include_dirs.is_match(&path_str)
    }

    pub fn should_rerun_file(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .map_or(false, |name| name.to_string_lossy().starts_with('.'));
        if hidden {
            trace!("Ignoring {:?}: hidden file", path);
            return false;
        }

        let path_str = path.to_string_lossy();

        if let Some(rule) = self.exclude_files.find(&path_str) {
            debug!("Ignoring {:?}: matched exclude rule {}", path, rule.as_str());
            return false;
        }

        let included = self.include_files.is_match(&path_str);
        if !included {
            trace!("Ignoring {:?}: did not match any file rule", path);
        }

        included
    }
}
