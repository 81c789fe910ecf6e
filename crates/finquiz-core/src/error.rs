//! Session error taxonomy.
//!
//! Defined in `finquiz-core` so the HTTP clients can convert transport
//! failures into these types at their boundary, and the session controller
//! only ever deals with classified outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Feedback;

/// Description shown in place of oracle feedback when grading failed.
pub const EVALUATION_FAILED_DESCRIPTION: &str = "Failed to evaluate answer. Please try again.";

/// Errors that prevent a session from being created.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The catalog or the user's point records could not be fetched.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The requested test id is not in the catalog.
    #[error("test not found: {0}")]
    TestNotFound(String),
}

/// The oracle could not grade an answer.
///
/// Non-fatal: the session stores it as the question's evaluation and the
/// user may continue.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("evaluation failed: {reason}")]
pub struct EvaluationFailed {
    pub reason: String,
}

impl EvaluationFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The zero-score feedback displayed for a failed evaluation.
    pub fn sentinel_feedback(&self) -> Feedback {
        Feedback::new(0.0, EVALUATION_FAILED_DESCRIPTION)
    }
}

/// The final score could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SubmissionFailed {
    /// The request never produced a response.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The server answered but did not accept the result.
    #[error("server rejected result: {0}")]
    ServerRejected(String),
}
