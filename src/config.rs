//! Configuration for devrun.
//!
//! The [`Config`] struct is not constructable, use [`ConfigBuilder`].
//!
//! # Examples
//!
//! ```
//! # use devrun::config::ConfigBuilder;
//! # use devrun::filter::FilterChain;
//! # use std::path::PathBuf;
//! ConfigBuilder::default()
//!     .cmd("go build && exec ./server")
//!     .dirs(vec![PathBuf::from(".")])
//!     .filters(FilterChain::defaults().expect("default patterns compile"))
//!     .build()
//!     .expect("mission failed");
//! ```

use std::{path::PathBuf, time::Duration};

use crate::debounce::QUIESCENCE;
use crate::filter::FilterChain;
use crate::search::SearchPath;
use crate::shell::Shell;

/// Arguments to the controller
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Config {
    /// Shell running the build and run commands.
    #[builder(default)]
    pub shell: Shell,
    /// Command run to completion before every start. If it fails, the run
    /// command is skipped until the next change.
    #[builder(default, setter(strip_option))]
    pub build_cmd: Option<String>,
    /// Command to start, and restart on change. When empty, changes are only
    /// reported.
    #[builder(default)]
    pub cmd: String,
    /// Root directories to walk for directories and imports.
    pub dirs: Vec<PathBuf>,
    /// Compiled directory and file rules.
    pub filters: FilterChain,
    /// Where imported packages are looked up.
    #[builder(default)]
    pub search_path: SearchPath,
    /// Quiet period ending a burst of changes.
    #[builder(default = "QUIESCENCE")]
    pub debounce: Duration,
    /// Use the polling backend at this interval.
    #[builder(default, setter(strip_option))]
    pub poll: Option<Duration>,
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.dirs.as_ref().map_or(true, Vec::is_empty) {
            return Err("dirs must not be empty".into());
        }

        if self.debounce.map_or(false, |d| d == Duration::from_millis(0)) {
            return Err("debounce must be greater than zero".into());
        }

        if let Some(Shell::Unix(ref name)) = self.shell {
            if name.trim().is_empty() {
                return Err("shell must not be empty".into());
            }
        }

        Ok(())
    }
}
