//! wagon: artifact repository transports on the command line
//!
//! Moves artifacts between local files and repositories kept in S3 or
//! Google Cloud Storage buckets.

mod commands;
mod exit_code;
mod output;
mod progress;
mod registry;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Cli;

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    commands::execute(cli).await.into()
}
