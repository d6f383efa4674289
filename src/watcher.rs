use notify::{raw_watcher, PollWatcher, RecommendedWatcher, RecursiveMode};
use std::collections::{btree_set, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::error::Result;

pub use notify::RawEvent as Event;

/// The directories to subscribe to, each once.
///
/// Built by the dependency walk, then handed over to [`Watcher::new`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchSet {
    paths: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path`, returning false if it was already present.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, PathBuf> {
        self.paths.iter()
    }
}

impl IntoIterator for WatchSet {
    type Item = PathBuf;
    type IntoIter = btree_set::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a WatchSet {
    type Item = &'a PathBuf;
    type IntoIter = btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

impl<P: Into<PathBuf>> std::iter::FromIterator<P> for WatchSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Thin wrapper over the notify crate
///
/// `PollWatcher` and `RecommendedWatcher` are distinct types, but the
/// controller just wants to hold on to whichever one is delivering events.
/// Every directory of the watch set is registered non-recursively: the set
/// already names each directory that matters.
pub struct Watcher {
    watcher_impl: WatcherImpl,
    watched: WatchSet,
}

enum WatcherImpl {
    Recommended(RecommendedWatcher),
    Poll(PollWatcher),
}

impl Watcher {
    /// Registers every path of `watch_set`. Any registration failure is an
    /// error: a watch set that cannot be honoured means a broken environment.
    pub fn new(tx: Sender<Event>, watch_set: WatchSet, poll: Option<Duration>) -> Result<Self> {
        use notify::Watcher;

        let imp = if let Some(interval) = poll {
            let interval_ms = interval.as_millis().min(u128::from(u32::MAX)) as u32;
            let mut watcher = PollWatcher::with_delay_ms(tx, interval_ms)?;
            for path in &watch_set {
                watcher.watch(path, RecursiveMode::NonRecursive)?;
                debug!("Watching {:?}", path);
            }

            WatcherImpl::Poll(watcher)
        } else {
            let mut watcher = raw_watcher(tx)?;
            for path in &watch_set {
                watcher.watch(path, RecursiveMode::NonRecursive)?;
                debug!("Watching {:?}", path);
            }

            WatcherImpl::Recommended(watcher)
        };

        Ok(Self {
            watcher_impl: imp,
            watched: watch_set,
        })
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.watcher_impl, WatcherImpl::Poll(_))
    }

    pub fn watched(&self) -> &WatchSet {
        &self.watched
    }
}
