//! Locating the source directory of an imported package.

use std::{
    env,
    ffi::OsStr,
    fs, io,
    path::{Component, Path, PathBuf},
};

/// Environment variable holding the search roots.
pub const SEARCH_PATH_VAR: &str = "GOPATH";
/// Directory under each search root that holds package sources.
pub const SOURCE_SUBDIR: &str = "src";

/// Ordered list of roots under which `<root>/<subdir>/<import>` is looked up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
    subdir: PathBuf,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(Vec::new(), SOURCE_SUBDIR)
    }
}

impl SearchPath {
    pub fn new(roots: Vec<PathBuf>, subdir: impl Into<PathBuf>) -> Self {
        Self {
            roots,
            subdir: subdir.into(),
        }
    }

    /// Reads the roots from `$GOPATH`. An unset variable gives an empty
    /// search path, which resolves nothing.
    pub fn from_env() -> Self {
        match env::var_os(SEARCH_PATH_VAR) {
            Some(value) => Self::parse(&value),
            None => {
                debug!("{} is not set, imports will not be followed", SEARCH_PATH_VAR);
                Self::default()
            }
        }
    }

    /// Splits a path list (colon-separated on unix) into roots, dropping
    /// empty entries.
    pub fn parse(value: &OsStr) -> Self {
        let roots = env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        Self::new(roots, SOURCE_SUBDIR)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Finds the directory holding `import`. The first root containing it
    /// wins; `None` means the import is not a local package.
    pub fn resolve(&self, import: &str) -> Option<PathBuf> {
        let import = Path::new(import);
        if import
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            trace!("Not resolving {:?}: not a plain package path", import);
            return None;
        }

        for root in &self.roots {
            let candidate = root.join(&self.subdir).join(import);
            match fs::metadata(&candidate) {
                Ok(meta) if meta.is_dir() => {
                    trace!("Resolved {:?} to {:?}", import, candidate);
                    return Some(fs::canonicalize(&candidate).unwrap_or(candidate));
                }
                Ok(_) => {}
                Err(ref err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("{}: {}", candidate.display(), err),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::SearchPath;
    use std::{ffi::OsStr, fs};

    #[test]
    #[cfg(unix)]
    fn parse_colon_separated_list() {
        let search = SearchPath::parse(OsStr::new("/a:/b::/c"));
        let roots: Vec<_> = search.roots().iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(roots, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn first_root_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(first.path().join("src/pkg/util")).unwrap();
        fs::create_dir_all(second.path().join("src/pkg/util")).unwrap();
        fs::create_dir_all(second.path().join("src/pkg/other")).unwrap();

        let search = SearchPath::new(
            vec![first.path().to_owned(), second.path().to_owned()],
            "src",
        );

        let util = search.resolve("pkg/util").unwrap();
        assert_eq!(util, first.path().join("src/pkg/util").canonicalize().unwrap());

        let other = search.resolve("pkg/other").unwrap();
        assert_eq!(other, second.path().join("src/pkg/other").canonicalize().unwrap());
    }

    #[test]
    fn unresolved_and_non_directory_imports() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("src/pkg")).unwrap();
        fs::write(root.path().join("src/pkg/file"), "not a package").unwrap();

        let search = SearchPath::new(vec![root.path().to_owned()], "src");
        assert_eq!(search.resolve("fmt"), None);
        assert_eq!(search.resolve("pkg/file"), None);
    }

    #[test]
    fn rejects_paths_escaping_the_root() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("src/pkg")).unwrap();

        let search = SearchPath::new(vec![root.path().join("src/pkg")], "");
        assert_eq!(search.resolve("../pkg"), None);
        assert_eq!(search.resolve("./"), None);
        assert_eq!(search.resolve("/"), None);
    }

    #[test]
    fn empty_search_path_resolves_nothing() {
        assert_eq!(SearchPath::default().resolve("pkg/util"), None);
    }
}
