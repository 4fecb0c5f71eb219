use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use trisync::cli::{self, Cli};
use trisync::ui::output;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let default_level = if cli.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
