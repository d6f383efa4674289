use std::env;
use std::io::Write;

use devrun::{cli, error::Result, run};
use log::LevelFilter;

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut log_builder = env_logger::Builder::new();
    log_builder
        .format(|buf, record| writeln!(buf, "*** {}", record.args()))
        .filter(None, level);

    if let Ok(filters) = env::var("RUST_LOG") {
        log_builder.parse_filters(&filters);
    }

    log_builder.init();
}

fn main() -> Result<()> {
    let args = cli::get_args()?;
    init_logger(args.verbosity);

    run(args.config)
}
