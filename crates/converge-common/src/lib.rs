//! Common plumbing for converge: errors, retry policy, manifest decoding and
//! kube client construction

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace workloads are applied to when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Pod phase counted as healthy by the convergence check
pub const POD_PHASE_RUNNING: &str = "Running";
