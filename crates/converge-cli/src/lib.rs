//! converge CLI library

pub mod config;
pub mod deploy;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use converge_common::DEFAULT_NAMESPACE;

use crate::config::{parse_duration, DeployConfig};

/// converge - apply a Deployment and wait until all of its pods are running
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Desired-state document (YAML or JSON apps/v1 Deployment)
    #[arg(
        short = 'f',
        long = "manifest",
        env = "CONVERGE_MANIFEST",
        default_value = "app.yaml"
    )]
    pub manifest: PathBuf,

    /// Namespace to apply the workload in
    #[arg(short, long, env = "CONVERGE_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Path to kubeconfig (defaults to KUBECONFIG, ~/.kube/config, or in-cluster)
    #[arg(long, env = "CONVERGE_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Time between pod listings (e.g. 5s, 500ms)
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Give up waiting after this long (e.g. 10m). Waits indefinitely if unset.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Give up after N consecutive pod-listing failures (0 = never give up)
    #[arg(long, default_value_t = 5)]
    pub max_list_failures: u32,

    /// Report object labels after a create instead of pod-template labels
    #[arg(long)]
    pub legacy_label_source: bool,
}

impl Cli {
    /// Run a deploy, stopping early on Ctrl-C
    pub async fn run(self) -> Result<()> {
        let config = DeployConfig::from_cli(&self)?;

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping");
                on_signal.cancel();
            }
        });

        deploy::run(config, cancel).await
    }
}
