//! Core trait definitions for the session's external collaborators.
//!
//! These async traits are implemented over HTTP by the `finquiz-client` crate,
//! and by in-memory fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EvaluationFailed, SubmissionFailed};
use crate::model::{Feedback, Test, UserPoints};

// ---------------------------------------------------------------------------
// Scoring oracle
// ---------------------------------------------------------------------------

/// External grading service that turns a free-text answer into feedback.
///
/// Implementations must not retry on their own; a failure is returned as
/// [`EvaluationFailed`] and the session decides what happens next.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Human-readable oracle name (e.g. "http").
    fn name(&self) -> &str;

    /// Grade one answer.
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<Feedback, EvaluationFailed>;
}

/// A question/answer pair sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub question: String,
    pub answer: String,
}

// ---------------------------------------------------------------------------
// Catalog source
// ---------------------------------------------------------------------------

/// Where tests and the user's historical points come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every published test.
    async fn fetch_tests(&self) -> anyhow::Result<Vec<Test>>;

    /// Fetch the current user's point records.
    async fn fetch_points(&self) -> anyhow::Result<Vec<UserPoints>>;
}

// ---------------------------------------------------------------------------
// Result sink
// ---------------------------------------------------------------------------

/// Persistence endpoint for a finished session's score.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Submit once. Implementations must not retry.
    async fn submit(&self, submission: &ResultSubmission) -> Result<(), SubmissionFailed>;
}

/// Aggregate result of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub test_id: String,
    pub points: f64,
    pub is_done: bool,
}
