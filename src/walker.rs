//! Discovery of the directories worth watching.
//!
//! Every directory under the roots is a candidate, and so is the source
//! directory of every local package a Go file under the roots imports. The
//! latter may live anywhere on disk, typically a sibling checkout under
//! `$GOPATH`.

use std::path::Path;

use walkdir::WalkDir;

use crate::{
    filter::FilterChain,
    imports,
    search::SearchPath,
    watcher::WatchSet,
};

pub struct DependencyWalker<'a> {
    filter: &'a FilterChain,
    search: &'a SearchPath,
}

impl<'a> DependencyWalker<'a> {
    pub fn new(filter: &'a FilterChain, search: &'a SearchPath) -> Self {
        Self { filter, search }
    }

    /// Walks each root and returns every accepted directory. Unreadable
    /// entries and unparseable files are logged and skipped.
    pub fn build_watch_set<P: AsRef<Path>>(&self, roots: &[P]) -> WatchSet {
        let mut watch_set = WatchSet::new();

        for root in roots {
            self.walk(root.as_ref(), &mut watch_set);
        }

        info!("Watching {} directories", watch_set.len());
        watch_set
    }

    fn walk(&self, root: &Path, watch_set: &mut WatchSet) {
        debug!("Scanning {:?}", root);

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("{}", err);
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if self.filter.should_watch_dir(path) {
                    watch_set.insert(path);
                }
            } else if file_type.is_file() && imports::is_module_file(path) {
                self.add_imports_of(path, watch_set);
            }
        }
    }

    fn add_imports_of(&self, path: &Path, watch_set: &mut WatchSet) {
        let imports = match imports::parse_file(path) {
            Ok(imports) => imports,
            Err(err) => {
                warn!("Skipping imports of {:?}: {}", path, err);
                return;
            }
        };

        for import in imports {
            if let Some(dir) = self.search.resolve(&import) {
                if self.filter.should_watch_dir(&dir) && watch_set.insert(dir.clone()) {
                    debug!("Following import {:?} of {:?} to {:?}", import, path, dir);
                }
            }
        }
    }
}
