//! Convergence waiting
//!
//! After a workload is applied, [`ConvergenceWaiter::block`] polls the pods
//! matching its label selector until every one reports phase `Running`.
//! Listing failures are tolerated with jittered backoff up to a cap of
//! consecutive failures. The wait can be bounded by a deadline and
//! interrupted by a [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use converge_common::retry::{Backoff, RetryConfig};
use converge_common::{Error, DEFAULT_NAMESPACE, POD_PHASE_RUNNING};

use crate::client::WorkloadClient;
use crate::selector::LabelSelector;

/// Default time between pod listings
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of consecutive listing failures before giving up
pub const DEFAULT_MAX_LIST_FAILURES: u32 = 5;
/// Upper bound on the backoff between failed listings
pub const DEFAULT_MAX_FAILURE_BACKOFF: Duration = Duration::from_secs(60);

/// One observation of the selected pods
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Convergence {
    /// Pods in phase `Running`
    pub running: usize,
    /// Pods matching the selector
    pub total: usize,
}

impl Convergence {
    /// Count running pods in a listing
    pub fn from_pods(pods: &[Pod]) -> Self {
        let running = pods.iter().filter(|p| is_running(p)).count();
        Self {
            running,
            total: pods.len(),
        }
    }

    /// True when every matching pod is running. Zero pods counts as converged.
    pub fn is_converged(&self) -> bool {
        self.running == self.total
    }
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Running {} out of {}", self.running, self.total)
    }
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == POD_PHASE_RUNNING)
}

/// Waiter lifecycle, reported in logs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitState {
    /// Still listing pods
    Polling,
    /// Every matching pod is running
    Converged,
    /// Gave up after too many consecutive listing failures
    Failed,
    /// Interrupted by the cancellation token
    Cancelled,
    /// The deadline passed first
    TimedOut,
}

impl WaitState {
    fn of(result: &Result<Convergence, Error>) -> Self {
        match result {
            Ok(_) => WaitState::Converged,
            Err(e) if e.is_cancelled() => WaitState::Cancelled,
            Err(e) if e.is_timeout() => WaitState::TimedOut,
            Err(_) => WaitState::Failed,
        }
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitState::Polling => "polling",
            WaitState::Converged => "converged",
            WaitState::Failed => "failed",
            WaitState::Cancelled => "cancelled",
            WaitState::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Waiter settings
#[derive(Clone, Debug)]
pub struct WaitConfig {
    /// Namespace to list pods in
    pub namespace: String,
    /// Time between successful listings
    pub poll_interval: Duration,
    /// Overall deadline (None = wait indefinitely)
    pub timeout: Option<Duration>,
    /// Backoff for failed listings. `max_attempts` caps consecutive failures.
    pub retry: RetryConfig,
}

impl WaitConfig {
    /// Settings for a namespace with a given poll interval and failure cap
    pub fn new(namespace: impl Into<String>, poll_interval: Duration, max_list_failures: u32) -> Self {
        Self {
            namespace: namespace.into(),
            poll_interval,
            timeout: None,
            retry: RetryConfig {
                max_attempts: max_list_failures,
                initial_delay: poll_interval,
                max_delay: DEFAULT_MAX_FAILURE_BACKOFF.max(poll_interval),
                backoff_multiplier: 2.0,
            },
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_POLL_INTERVAL, DEFAULT_MAX_LIST_FAILURES)
    }
}

/// Blocks until the pods selected by a label selector are all running
pub struct ConvergenceWaiter {
    client: Arc<dyn WorkloadClient>,
    config: WaitConfig,
    cancel: CancellationToken,
}

impl ConvergenceWaiter {
    /// Create a waiter that can only be stopped by its deadline
    pub fn new(client: Arc<dyn WorkloadClient>, config: WaitConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop waiting when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll until every pod matching `selector` is running.
    ///
    /// `on_progress` is called with every successful observation, including
    /// the final converged one. A selector that matches no pods converges on
    /// the first listing.
    #[instrument(skip(self, on_progress), fields(selector = %selector, namespace = %self.config.namespace))]
    pub async fn block<F>(
        &self,
        selector: &LabelSelector,
        on_progress: F,
    ) -> Result<Convergence, Error>
    where
        F: FnMut(Convergence),
    {
        let query = selector.to_query()?;
        let result = self.poll(&query, on_progress).await;
        let state = WaitState::of(&result);
        match &result {
            Ok(c) => info!(%state, running = c.running, total = c.total, "wait finished"),
            Err(e) => warn!(%state, error = %e, "wait finished"),
        }
        result
    }

    async fn poll<F>(&self, query: &str, mut on_progress: F) -> Result<Convergence, Error>
    where
        F: FnMut(Convergence),
    {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let mut backoff = Backoff::new(self.config.retry.clone());

        loop {
            let listed = self
                .interruptible(query, deadline, self.client.list_pods(&self.config.namespace, query))
                .await?;

            let delay = match listed {
                Ok(pods) => {
                    backoff.reset();
                    let observed = Convergence::from_pods(&pods);
                    on_progress(observed);
                    if observed.is_converged() {
                        return Ok(observed);
                    }
                    debug!(state = %WaitState::Polling, %observed, "pods not yet running");
                    self.config.poll_interval
                }
                // Auth and validation failures will not clear up on their own
                Err(e) if !e.is_retryable() => {
                    return Err(Error::poll_exhausted(query, backoff.attempt() + 1, e));
                }
                Err(e) => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            error = %e,
                            attempt = backoff.attempt(),
                            ?delay,
                            "listing pods failed, backing off"
                        );
                        delay
                    }
                    None => return Err(Error::poll_exhausted(query, backoff.attempt(), e)),
                },
            };

            self.interruptible(query, deadline, tokio::time::sleep(delay))
                .await?;
        }
    }

    /// Run `fut` unless cancellation or the deadline wins first
    async fn interruptible<T>(
        &self,
        query: &str,
        deadline: Option<Instant>,
        fut: impl Future<Output = T>,
    ) -> Result<T, Error> {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled(format!(
                "waiting for pods matching {}",
                query
            ))),
            _ = expired => Err(Error::timeout(
                format!("pods matching {} are not all running", query),
                self.config.timeout.unwrap_or_default(),
            )),
            out = fut => Ok(out),
        }
    }
}
