//! Retry policy with exponential backoff and jitter.
//!
//! Used by poll loops that must tolerate transient control-plane failures
//! without hammering the API server during an outage. The caller owns the
//! loop and the sleep; [`Backoff`] only decides how long to wait and when to
//! give up.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use converge_common::retry::{Backoff, RetryConfig};
//!
//! let mut backoff = Backoff::new(RetryConfig {
//!     max_attempts: 2,
//!     initial_delay: Duration::from_millis(10),
//!     ..RetryConfig::default()
//! });
//!
//! assert!(backoff.next_delay().is_some());
//! assert!(backoff.next_delay().is_none());
//! ```

use std::time::Duration;

use rand::Rng;

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of consecutive failed attempts (0 = infinite)
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Tracks consecutive failures and hands out jittered, exponentially growing delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    delay: Duration,
    attempt: u32,
}

impl Backoff {
    /// Start a fresh backoff sequence
    pub fn new(config: RetryConfig) -> Self {
        let delay = config.initial_delay;
        Self {
            config,
            delay,
            attempt: 0,
        }
    }

    /// Number of consecutive failures recorded since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failure and return how long to wait before the next attempt.
    ///
    /// Returns `None` once `max_attempts` consecutive failures have been
    /// recorded; the caller should give up with the last error.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts {
            return None;
        }

        // Add jitter: 0.5x to 1.5x of the delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(self.delay.as_secs_f64() * jitter);

        // Exponential backoff, capped at max_delay
        self.delay = Duration::from_secs_f64(
            (self.delay.as_secs_f64() * self.config.backoff_multiplier)
                .min(self.config.max_delay.as_secs_f64()),
        );

        Some(jittered)
    }

    /// Forget recorded failures after a successful attempt
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.config.initial_delay;
    }
}
