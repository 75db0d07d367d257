//! converge CLI
//!
//! Applies a Deployment manifest and blocks until its pods are running.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use converge_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the progress lines
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cause = e.inner();
            error!(
                step = cause.and_then(|c| c.context()),
                workload = cause.and_then(|c| c.workload()),
                exit_code = e.exit_code(),
                "deploy failed"
            );
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
