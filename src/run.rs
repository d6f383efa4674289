use std::sync::mpsc::channel;

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::process::{self, ManagedProcess};
use crate::walker::DependencyWalker;
use crate::watcher::Watcher;

/// Walks the configured roots, watches what was found, and restarts the
/// command on every qualifying change.
///
/// Returns early only on setup errors; otherwise runs until the process is
/// killed.
pub fn run(config: Config) -> Result<()> {
    info!("Running watcher");
    if config.cmd.trim().is_empty() {
        warn!("no command to run");
    }

    let watch_set =
        DependencyWalker::new(&config.filters, &config.search_path).build_watch_set(&config.dirs);

    let (tx, rx) = channel();
    let watcher = Watcher::new(tx, watch_set, config.poll)?;

    if watcher.is_polling() {
        if let Some(interval) = config.poll {
            warn!("Polling for changes every {} ms", interval.as_millis());
        }
    }

    let debouncer = Debouncer::new(rx, config.filters.clone(), config.debounce);

    let mut current = launch(&config, None);
    while let Some(change) = debouncer.next_rerun() {
        info!("Change detected: {}", change.path.display());
        current = launch(&config, current);
    }

    process::stop_if_running(current);
    drop(watcher);
    Ok(())
}

/// Replaces `previous` with a fresh process. Start failures are logged; the
/// next change tries again.
fn launch(config: &Config, previous: Option<ManagedProcess>) -> Option<ManagedProcess> {
    match process::restart(config, previous) {
        Ok(process) => process,
        Err(err) => {
            error!("{}", err);
            None
        }
    }
}
