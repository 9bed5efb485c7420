use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use archsnap::cli::{Cli, run};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports and JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.global.log_level.parse().unwrap_or_default()),
        )
        .init();

    debug!("archsnap v{}", env!("CARGO_PKG_VERSION"));

    let outcome = run(&cli);
    ExitCode::from(outcome.exit_code())
}
