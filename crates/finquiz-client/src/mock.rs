//! Mock collaborators for testing sessions without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use finquiz_core::error::{EvaluationFailed, SubmissionFailed};
use finquiz_core::model::Feedback;
use finquiz_core::traits::{EvaluateRequest, ResultSink, ResultSubmission, ScoringOracle};

/// A mock oracle that grades by matching question content.
pub struct MockOracle {
    /// Map of question substring → score.
    scores: HashMap<String, f64>,
    /// Score used when no question matches.
    default_score: f64,
    /// Question substrings that fail to grade.
    failing: Vec<String>,
    /// How long each grading takes.
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<EvaluateRequest>>,
}

impl MockOracle {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        Self {
            scores,
            default_score: 5.0,
            failing: Vec::new(),
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same score.
    pub fn with_fixed_score(score: f64) -> Self {
        Self {
            default_score: score,
            ..Self::new(HashMap::new())
        }
    }

    /// Fail every question whose content contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    /// Answer only after `delay`, like a slow oracle.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<EvaluateRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ScoringOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<Feedback, EvaluationFailed> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.iter().any(|n| request.question.contains(n)) {
            return Err(EvaluationFailed::new("mock failure"));
        }

        let score = self
            .scores
            .iter()
            .find(|(key, _)| request.question.contains(key.as_str()))
            .map(|(_, v)| *v)
            .unwrap_or(self.default_score);

        Ok(Feedback::new(score, format!("Mock grade: {score}/10")))
    }
}

/// A mock result sink that records every submission.
#[derive(Default)]
pub struct MockResultSink {
    rejection: Option<SubmissionFailed>,
    submissions: Mutex<Vec<ResultSubmission>>,
}

impl MockResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails every submission with `error`.
    pub fn rejecting(error: SubmissionFailed) -> Self {
        Self {
            rejection: Some(error),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submissions(&self) -> Vec<ResultSubmission> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ResultSink for MockResultSink {
    async fn submit(&self, submission: &ResultSubmission) -> Result<(), SubmissionFailed> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(submission.clone());
        match &self.rejection {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question: &str) -> EvaluateRequest {
        EvaluateRequest {
            question: question.into(),
            answer: "an answer".into(),
        }
    }

    #[tokio::test]
    async fn fixed_score() {
        let oracle = MockOracle::with_fixed_score(7.0);
        let feedback = oracle.evaluate(&request("anything")).await.unwrap();
        assert_eq!(feedback.score, 7.0);
        assert_eq!(oracle.call_count(), 1);
        assert_eq!(oracle.last_request().unwrap().answer, "an answer");
    }

    #[tokio::test]
    async fn question_matching_and_failures() {
        let mut scores = HashMap::new();
        scores.insert("inflation".to_string(), 9.0);
        let oracle = MockOracle::new(scores).failing_on("credit");

        let feedback = oracle.evaluate(&request("Define inflation")).await.unwrap();
        assert_eq!(feedback.score, 9.0);

        let feedback = oracle.evaluate(&request("Define equity")).await.unwrap();
        assert_eq!(feedback.score, 5.0);

        assert!(oracle.evaluate(&request("What is a credit score?")).await.is_err());
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_grading_waits() {
        let oracle = MockOracle::with_fixed_score(4.0).with_delay(Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        let feedback = oracle.evaluate(&request("Define liquidity")).await.unwrap();
        assert_eq!(feedback.score, 4.0);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn sink_records_and_rejects() {
        let sink = MockResultSink::rejecting(SubmissionFailed::NetworkError("offline".into()));
        let submission = ResultSubmission {
            test_id: "1".into(),
            points: 4.0,
            is_done: true,
        };
        assert!(sink.submit(&submission).await.is_err());
        assert_eq!(sink.submissions(), vec![submission]);
    }
}
