use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy of the completion source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    /// Caller input is incomplete. Raised before any network call.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The model endpoint rejected or failed the call.
    #[error("upstream model error (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CompletionError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Only upstream failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}
