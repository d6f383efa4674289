use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{App, AppSettings, Arg, ArgMatches};

use crate::config::{Config, ConfigBuilder};
use crate::error::{Error, Result};
use crate::filter::FilterChain;
use crate::search::SearchPath;
use crate::shell::Shell;

/// Environment variable naming the shell used when `--shell` is not given.
pub const SHELL_VAR: &str = "SHELL";

/// Parsed command line: the controller configuration plus how chatty to be.
#[derive(Debug)]
pub struct Args {
    pub config: Config,
    pub verbosity: u64,
}

pub fn get_args() -> Result<Args> {
    args_from(&app().get_matches())
}

/// Parses `argv` without exiting the process on bad input.
pub fn get_args_from<I, T>(argv: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app()
        .get_matches_from_safe(argv)
        .map_err(|e| Error::Config(e.message))?;
    args_from(&matches)
}

fn app() -> App<'static, 'static> {
    App::new("devrun")
        .version(crate_version!())
        .about("Rebuild and rerun a program when its sources or local dependencies change")
        .setting(AppSettings::TrailingVarArg)
        .arg(Arg::with_name("command")
            .help("Command to run, if --run is not given")
            .multiple(true)
            .conflicts_with("run"))
        .arg(Arg::with_name("run")
            .help("Shell command to run (e.g. 'go build && exec ./prog')")
            .short("r")
            .long("run")
            .takes_value(true)
            .value_name("command"))
        .arg(Arg::with_name("build")
            .help("Shell command to run to completion before each run; a failure skips the run")
            .short("b")
            .long("build")
            .takes_value(true)
            .value_name("command"))
        .arg(Arg::with_name("shell")
            .help("Shell to use; environment variables are expanded [default: $SHELL, or sh]")
            .short("s")
            .long("shell")
            .takes_value(true)
            .value_name("shell"))
        .arg(Arg::with_name("dir")
            .help("Directory to watch and scan for dependencies [default: ./]")
            .short("d")
            .long("dir")
            .number_of_values(1)
            .multiple(true)
            .takes_value(true))
        .arg(Arg::with_name("include")
            .help("Regexp of dirs to include for watching [default: .*]")
            .short("i")
            .long("include")
            .number_of_values(1)
            .multiple(true)
            .takes_value(true)
            .value_name("regex"))
        .arg(Arg::with_name("exclude")
            .help("Regexp of dirs to exclude from watching [default: ^\\.*$]")
            .short("e")
            .long("exclude")
            .number_of_values(1)
            .multiple(true)
            .takes_value(true)
            .value_name("regex"))
        .arg(Arg::with_name("files")
            .help("Regexp of files that, if changed, cause a rerun [default: ^(.*\\.go|.*\\.yaml|.*\\.conf)$]")
            .short("f")
            .long("files")
            .number_of_values(1)
            .multiple(true)
            .takes_value(true)
            .value_name("regex"))
        .arg(Arg::with_name("exclude-files")
            .help("Regexp of files whose changes never cause a rerun")
            .short("x")
            .long("exclude-files")
            .number_of_values(1)
            .multiple(true)
            .takes_value(true)
            .value_name("regex"))
        .arg(Arg::with_name("debounce")
            .help("Quiet period after the last change before rerunning, in ms [default: 300]")
            .long("debounce")
            .takes_value(true)
            .value_name("milliseconds"))
        .arg(Arg::with_name("poll")
            .help("Forces polling mode")
            .long("force-poll")
            .takes_value(true)
            .value_name("interval"))
        .arg(Arg::with_name("verbose")
            .help("Print debugging messages to stderr (twice for more)")
            .short("v")
            .long("verbose")
            .multiple(true))
}

fn values(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches
        .values_of(name)
        .map(|v| v.map(str::to_string).collect())
        .unwrap_or_default()
}

fn millis(matches: &ArgMatches, name: &str) -> Result<Option<Duration>> {
    if matches.occurrences_of(name) == 0 {
        return Ok(None);
    }

    value_t!(matches, name, u64)
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|e| Error::Config(e.message))
}

fn canonicalize(dir: &str) -> Result<PathBuf> {
    Path::new(dir)
        .canonicalize()
        .map_err(|e| Error::Canonicalization(dir.to_owned(), e))
}

/// Expands environment variables in an explicit shell, or falls back to
/// `$SHELL` and then the platform default.
fn shell(explicit: Option<&str>) -> Result<Shell> {
    let raw = match explicit {
        Some(raw) => raw,
        None => {
            return Ok(match env::var(SHELL_VAR) {
                Ok(ref sh) if !sh.trim().is_empty() => Shell::from_program(sh),
                _ => Shell::default(),
            })
        }
    };

    let expanded = shellexpand::full(raw)
        .map_err(|e| Error::Config(format!("cannot expand shell '{}': {}", raw, e)))?;
    if expanded.trim().is_empty() {
        return Err(Error::Config(format!("shell '{}' expands to nothing", raw)));
    }

    Ok(Shell::from_program(&expanded))
}

fn args_from(matches: &ArgMatches) -> Result<Args> {
    let cmd = match matches.value_of("run") {
        Some(run) => run.to_owned(),
        None => values(matches, "command").join(" "),
    };

    let mut dirs = values(matches, "dir");
    if dirs.is_empty() {
        dirs.push(String::from("./"));
    }
    let dirs = dirs
        .iter()
        .map(|d| canonicalize(d))
        .collect::<Result<Vec<_>>>()?;

    let filters = FilterChain::new(
        &values(matches, "include"),
        &values(matches, "exclude"),
        &values(matches, "files"),
        &values(matches, "exclude-files"),
    )?;

    let mut builder = ConfigBuilder::default();
    builder
        .shell(shell(matches.value_of("shell"))?)
        .cmd(cmd)
        .dirs(dirs)
        .filters(filters)
        .search_path(SearchPath::from_env());

    if let Some(build) = matches.value_of("build") {
        builder.build_cmd(build);
    }
    if let Some(debounce) = millis(matches, "debounce")? {
        builder.debounce(debounce);
    }
    if let Some(interval) = millis(matches, "poll")? {
        builder.poll(interval);
    }

    Ok(Args {
        config: builder.build()?,
        verbosity: matches.occurrences_of("verbose"),
    })
}
