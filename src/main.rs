//! # metaship CLI
//!
//! Binary entry point. Parses arguments, sets up logging from `--debug` /
//! `--quiet` (`RUST_LOG` overrides), and hands off to [`metaship::cli::run`].

use std::process::ExitCode;

use metaship::cli::{self, Cli};
use metaship::ui::output::{self, Verbosity};

fn main() -> ExitCode {
    let args = Cli::parse_args();
    let verbosity = Verbosity::from_flags(args.quiet, args.debug);

    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
