//! up: synthetic monitoring probe.
//!
//! Writes a marker series, reads it back, runs the configured queries, and
//! exits non-zero when any probe falls below its success threshold.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use up::{Flags, Options, app};

#[tokio::main]
async fn main() -> ExitCode {
    let flags = Flags::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(flags.log_level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = up::version_string(),
        built = up::version::BUILD_TIMESTAMP,
        name = %flags.name,
        "up starting"
    );

    let options = match Options::from_flags(flags) {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "could not parse command line flags");
            return ExitCode::FAILURE;
        }
    };

    match app::run(options).await {
        Ok(()) => {
            info!("up completed its mission!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run group exited with error");
            ExitCode::FAILURE
        }
    }
}
