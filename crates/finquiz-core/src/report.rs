//! Session report with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Feedback;
use crate::score::{ScoreSummary, ScoreTier};
use crate::session::{SubmissionStatus, TestSession};

/// Everything a user saw at the end of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session identifier.
    pub id: Uuid,
    pub test_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// `None` if the report was taken before completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the deadline ended the session.
    #[serde(default)]
    pub forced: bool,
    pub summary: ScoreSummary,
    pub submission: Option<SubmissionStatus>,
    pub questions: Vec<QuestionReport>,
}

/// One question as answered and graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReport {
    pub number: usize,
    pub question: String,
    pub answer: String,
    pub feedback: Option<Feedback>,
    /// True when the oracle failed and `feedback` is the sentinel.
    #[serde(default)]
    pub evaluation_failed: bool,
}

impl SessionReport {
    /// Build a report from the session's current state.
    pub fn from_session(session: &TestSession) -> Self {
        let test = session.test();
        let answers = session.answers();
        let evaluations = session.evaluations();
        let completion = session.completion();

        let summary = completion
            .as_ref()
            .map(|c| c.summary.clone())
            .unwrap_or_else(|| ScoreSummary::compute(&evaluations));

        let questions = test
            .questions
            .iter()
            .zip(answers)
            .zip(&evaluations)
            .enumerate()
            .map(|(i, ((question, answer), evaluation))| QuestionReport {
                number: i + 1,
                question: question.content.clone(),
                answer,
                feedback: evaluation.as_ref().map(|e| match e {
                    Ok(feedback) => feedback.clone(),
                    Err(failure) => failure.sentinel_feedback(),
                }),
                evaluation_failed: matches!(evaluation, Some(Err(_))),
            })
            .collect();

        Self {
            id: session.id(),
            test_id: test.id.clone(),
            title: test.title.clone(),
            started_at: session.started_at(),
            completed_at: completion.as_ref().map(|c| c.completed_at),
            forced: completion.as_ref().is_some_and(|c| c.forced),
            summary,
            submission: completion.map(|c| c.submission),
            questions,
        }
    }

    pub fn tier(&self) -> Option<ScoreTier> {
        self.summary.tier()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}
