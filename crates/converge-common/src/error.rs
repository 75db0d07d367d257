//! Error types for converge
//!
//! Errors are structured with fields to aid debugging from a release pipeline
//! log. Each variant carries the workload, step, or selector that was being
//! processed when the failure happened.

use std::time::Duration;

use thiserror::Error;

/// Main error type for converge operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Reading the desired-state document failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the document
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// The desired-state document is well-formed but not acceptable
    #[error("validation error for {workload}: {message}")]
    Validation {
        /// Name of the workload with invalid configuration
        workload: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "metadata.namespace")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being decoded (if known)
        kind: Option<String>,
    },

    /// The document decodes to a resource kind this tool cannot reconcile
    #[error("unsupported workload {api_version}/{kind}: only apps/v1 Deployment is supported")]
    UnsupportedKind {
        /// apiVersion found in the document
        api_version: String,
        /// kind found in the document
        kind: String,
    },

    /// Label selector is empty or violates Kubernetes label syntax
    #[error("invalid label selector: {message}")]
    Selector {
        /// Description of what's invalid
        message: String,
    },

    /// A control-plane call failed during a named step
    #[error("{step} failed for {target}: {source}")]
    Step {
        /// Step that failed (e.g., "get", "create", "replace")
        step: String,
        /// Workload name or selector the step operated on
        target: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Listing member pods failed too many times in a row
    #[error("listing pods for {selector} failed {attempts} consecutive times: {source}")]
    PollExhausted {
        /// Selector that was being polled
        selector: String,
        /// Number of consecutive failed attempts
        attempts: u32,
        /// The last failure observed
        #[source]
        source: Box<Error>,
    },

    /// The overall deadline passed before the operation finished
    #[error("timed out after {elapsed:?}: {message}")]
    Timeout {
        /// What was being waited for
        message: String,
        /// Configured deadline
        elapsed: Duration,
    },

    /// The operation was interrupted by a cancellation signal
    #[error("cancelled: {message}")]
    Cancelled {
        /// What was interrupted
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_client", "reconciler")
        context: String,
    },
}

impl Error {
    /// Create an I/O error for the given path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error with workload context and field path
    pub fn validation_for_field(
        workload: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            workload: workload.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an unsupported-kind error
    pub fn unsupported_kind(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedKind {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Create a selector error
    pub fn selector(msg: impl Into<String>) -> Self {
        Self::Selector {
            message: msg.into(),
        }
    }

    /// Wrap an error with the step and target it came from
    pub fn step(step: impl Into<String>, target: impl Into<String>, source: Error) -> Self {
        Self::Step {
            step: step.into(),
            target: target.into(),
            source: Box::new(source),
        }
    }

    /// Create an error for a poll loop that ran out of consecutive attempts
    pub fn poll_exhausted(selector: impl Into<String>, attempts: u32, source: Error) -> Self {
        Self::PollExhausted {
            selector: selector.into(),
            attempts,
            source: Box::new(source),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            message: msg.into(),
            elapsed,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Input errors (validation, decoding, unsupported kind, selector syntax)
    /// need a document fix. Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Don't retry on 4xx errors (validation, conflict, forbidden, ...)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Io { .. } => false,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::UnsupportedKind { .. } => false,
            Error::Selector { .. } => false,
            Error::Step { source, .. } => source.is_retryable(),
            Error::PollExhausted { .. } => false,
            Error::Timeout { .. } => false,
            Error::Cancelled { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// True if this error, or the error it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True if this error is an expired deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Get the workload name if this error is associated with one
    pub fn workload(&self) -> Option<&str> {
        match self {
            Error::Validation { workload, .. } => Some(workload),
            Error::Step { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            Error::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: a bad document is reported with the field that needs fixing
    #[test]
    fn story_validation_names_workload_and_field() {
        let err = Error::validation_for_field("web", "metadata.namespace", "namespace mismatch");
        assert!(err.to_string().contains("web"));
        assert!(err.to_string().contains("namespace mismatch"));
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("metadata.namespace"));
            }
            _ => panic!("Expected Validation variant"),
        }
        assert!(!err.is_retryable());
        assert_eq!(err.workload(), Some("web"));
    }

    /// Story: a failed control-plane write tells the operator which call failed
    #[test]
    fn story_step_errors_identify_the_call() {
        let err = Error::step(
            "create",
            "web",
            Error::internal_with_context("apiserver", "connection reset"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("create failed for web"));
        assert!(msg.contains("connection reset"));
        assert_eq!(err.context(), Some("create"));
        assert_eq!(err.workload(), Some("web"));
        // Retryability follows the wrapped error
        assert!(err.is_retryable());
    }

    fn api_error(code: u16, reason: &str) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed: {}", reason),
            reason: reason.to_string(),
            code,
        }))
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for (code, reason) in [(400, "BadRequest"), (401, "Unauthorized"), (403, "Forbidden")] {
            assert!(!api_error(code, reason).is_retryable(), "{code} should be fatal");
        }
        assert!(api_error(500, "InternalError").is_retryable());
        assert!(api_error(503, "ServiceUnavailable").is_retryable());
    }

    #[test]
    fn test_unsupported_kind_message() {
        let err = Error::unsupported_kind("apps/v1", "StatefulSet");
        assert!(err.to_string().contains("apps/v1/StatefulSet"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_poll_exhausted_keeps_last_error() {
        let err = Error::poll_exhausted(
            "app=web",
            5,
            Error::internal_with_context("list_pods", "list failed"),
        );
        assert!(err.to_string().contains("app=web"));
        assert!(err.to_string().contains("5 consecutive"));
        assert!(err.to_string().contains("list failed"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert!(source.is_some_and(|s| s.contains("list failed")));
    }

    #[test]
    fn test_cancelled_is_distinct_from_timeout() {
        let cancelled = Error::cancelled("waiting for pods");
        let timeout = Error::timeout("waiting for pods", Duration::from_secs(60));

        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());
        assert!(timeout.is_timeout());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_seen_through_step() {
        let err = Error::step("replace", "web", Error::cancelled("apply"));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_internal_error_names_context() {
        let err = Error::internal_with_context("create_client", "no kubeconfig found");
        assert_eq!(err.context(), Some("create_client"));
        assert!(err.to_string().contains("[create_client]"));
    }

    #[test]
    fn test_io_error_names_path() {
        let err = Error::io(
            "app.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.to_string().contains("app.yaml"));
        assert!(!err.is_retryable());
    }
}
