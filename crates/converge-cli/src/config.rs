//! Deploy settings resolved from command-line flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use converge_workload::{LabelSource, ReconcileConfig, WaitConfig};

use crate::{Cli, Error, Result};

/// Parse a duration like `90s`, `5m`, `1h`, `250ms`, or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || {
        Error::validation(format!(
            "invalid duration '{}', expected e.g. 1h, 30m, 5s, 500ms",
            s
        ))
    };

    // Milliseconds per unit
    let (digits, scale) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60_000)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1000)
    } else {
        // Raw seconds
        (s, 1000)
    };

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    n.checked_mul(scale)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// Everything one deploy run needs
#[derive(Clone, Debug)]
pub struct DeployConfig {
    /// Path of the desired-state document
    pub manifest: PathBuf,
    /// Target namespace
    pub namespace: String,
    /// Explicit kubeconfig, if any
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context override
    pub context: Option<String>,
    /// Reconciler settings
    pub reconcile: ReconcileConfig,
    /// Waiter settings
    pub wait: WaitConfig,
}

impl DeployConfig {
    /// Validate flags and build the run configuration
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.namespace.trim().is_empty() {
            return Err(Error::validation("namespace must not be empty"));
        }
        if cli.poll_interval.is_zero() {
            return Err(Error::validation("poll interval must be greater than zero"));
        }
        if cli.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::validation("timeout must be greater than zero"));
        }

        let label_source = if cli.legacy_label_source {
            LabelSource::Legacy
        } else {
            LabelSource::Template
        };

        let mut wait = WaitConfig::new(&cli.namespace, cli.poll_interval, cli.max_list_failures);
        wait.timeout = cli.timeout;

        Ok(Self {
            manifest: cli.manifest.clone(),
            namespace: cli.namespace.clone(),
            kubeconfig: cli.kubeconfig.clone(),
            context: cli.context.clone(),
            reconcile: ReconcileConfig { label_source },
            wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("converge").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 30 ").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for bad in ["", "s", "five", "-5s", "1.5m", "10d"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_defaults_match_legacy_behavior() {
        let config = DeployConfig::from_cli(&cli(&[])).expect("defaults are valid");

        assert_eq!(config.manifest, PathBuf::from("app.yaml"));
        assert_eq!(config.namespace, "default");
        assert_eq!(config.kubeconfig, None);
        assert_eq!(config.reconcile.label_source, LabelSource::Template);
        assert_eq!(config.wait.namespace, "default");
        assert_eq!(config.wait.poll_interval, Duration::from_secs(5));
        assert_eq!(config.wait.timeout, None);
        assert_eq!(config.wait.retry.max_attempts, 5);
    }

    #[test]
    fn test_flags_flow_into_config() {
        let config = DeployConfig::from_cli(&cli(&[
            "-f",
            "deploy/web.yaml",
            "-n",
            "storefront",
            "--context",
            "staging",
            "--poll-interval",
            "2s",
            "--timeout",
            "10m",
            "--max-list-failures",
            "0",
            "--legacy-label-source",
        ]))
        .expect("flags are valid");

        assert_eq!(config.manifest, PathBuf::from("deploy/web.yaml"));
        assert_eq!(config.namespace, "storefront");
        assert_eq!(config.context.as_deref(), Some("staging"));
        assert_eq!(config.reconcile.label_source, LabelSource::Legacy);
        assert_eq!(config.wait.namespace, "storefront");
        assert_eq!(config.wait.poll_interval, Duration::from_secs(2));
        assert_eq!(config.wait.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.wait.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.wait.retry.max_attempts, 0);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = DeployConfig::from_cli(&cli(&["--poll-interval", "0s"]))
            .expect_err("zero interval would spin");
        assert!(err.to_string().contains("poll interval"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(DeployConfig::from_cli(&cli(&["--timeout", "0"])).is_err());
    }

    #[test]
    fn test_empty_namespace_is_rejected() {
        assert!(DeployConfig::from_cli(&cli(&["--namespace", ""])).is_err());
    }

    #[test]
    fn test_bad_duration_flag_fails_to_parse() {
        let result = Cli::try_parse_from(["converge", "--timeout", "soon"]);
        assert!(result.is_err());
    }
}
