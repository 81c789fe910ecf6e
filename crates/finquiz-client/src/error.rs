//! Transport error classification.

use thiserror::Error;

use finquiz_core::error::{EvaluationFailed, SubmissionFailed};

/// Errors that can occur when talking to the platform or the oracle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The server returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ClientError {
    /// Classify a reqwest send error.
    pub(crate) fn from_send(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(timeout_secs)
        } else {
            ClientError::NetworkError(e.to_string())
        }
    }

    /// True when no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout(_) | ClientError::NetworkError(_) | ClientError::ClientBuild(_)
        )
    }
}

impl From<ClientError> for EvaluationFailed {
    fn from(e: ClientError) -> Self {
        EvaluationFailed::new(e.to_string())
    }
}

impl From<ClientError> for SubmissionFailed {
    fn from(e: ClientError) -> Self {
        if e.is_transport() {
            SubmissionFailed::NetworkError(e.to_string())
        } else {
            SubmissionFailed::ServerRejected(e.to_string())
        }
    }
}
