//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for an interrupted run (128 + SIGINT)
pub const EXIT_INTERRUPTED: u8 = 130;
/// Exit code for any other failure
pub const EXIT_FAILURE: u8 = 1;

/// CLI errors, one per stage of a deploy
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("cannot reach cluster: {0}")]
    Client(#[source] converge_common::Error),

    #[error("invalid manifest: {0}")]
    Manifest(#[source] converge_common::Error),

    #[error("apply failed: {0}")]
    Reconcile(#[source] converge_common::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] converge_common::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// The underlying library error, if any
    pub fn inner(&self) -> Option<&converge_common::Error> {
        match self {
            Error::Validation { .. } => None,
            Error::Client(e) | Error::Manifest(e) | Error::Reconcile(e) | Error::Wait(e) => {
                Some(e)
            }
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self.inner() {
            Some(e) if e.is_cancelled() => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}
