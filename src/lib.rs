//! devrun: the library
//!
//! Reruns a development command whenever its sources change. The watched set
//! is the directories under the given roots plus every locally resolvable
//! package the sources import, so edits to dependencies outside the project
//! trigger a rerun too.
//!
//! The CLI tool is implemented with this library; the library interface comes
//! second and may change between releases.

#![warn(clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code)]
#![allow(
    clippy::default_trait_access,
    clippy::cognitive_complexity,
    clippy::module_name_repetitions
)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate log;

pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod imports;
pub mod pathop;
pub mod process;
pub mod run;
pub mod search;
pub mod shell;
pub mod walker;
pub mod watcher;

pub use run::run;
