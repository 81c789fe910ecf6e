//! Test session controller.
//!
//! Holds the state of one user working through one test: the current question,
//! answers, oracle evaluations and the completion flag. Intents take `&self`
//! so a presentation loop can issue them concurrently; the state mutex is only
//! held between awaits, never across one.
//!
//! ```text
//! open ──► Active(index) ──► Completed
//!            │  Unevaluated ─evaluate─► Evaluating ─► Evaluated
//!            └─ advance on the last Evaluated question completes and submits
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;
use uuid::Uuid;

use crate::catalog::{load_catalog, Catalog};
use crate::error::{EvaluationFailed, SessionError, SubmissionFailed};
use crate::model::{Feedback, Question, Test};
use crate::score::{Evaluation, ScoreSummary};
use crate::timer::SessionTimer;
use crate::traits::{CatalogSource, EvaluateRequest, ResultSink, ResultSubmission, ScoringOracle};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens when the countdown reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlinePolicy {
    /// The clock is informational; the user may keep working.
    #[default]
    Soft,
    /// The session completes and submits once the clock expires.
    Enforce,
}

impl fmt::Display for DeadlinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlinePolicy::Soft => write!(f, "soft"),
            DeadlinePolicy::Enforce => write!(f, "enforce"),
        }
    }
}

impl FromStr for DeadlinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(DeadlinePolicy::Soft),
            "enforce" | "hard" => Ok(DeadlinePolicy::Enforce),
            other => Err(format!("unknown deadline policy: {other}")),
        }
    }
}

/// Session behavior switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub deadline: DeadlinePolicy,
    /// Let the user re-send a frozen answer whose grading failed.
    #[serde(default = "default_true")]
    pub allow_retry_after_failure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline: DeadlinePolicy::Soft,
            allow_retry_after_failure: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Network collaborators a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub oracle: Arc<dyn ScoringOracle>,
    pub sink: Arc<dyn ResultSink>,
}

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionState {
    Unevaluated,
    Evaluating,
    Evaluated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Failed(SubmissionFailed),
}

/// Final result of a session, readable even if persistence failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub summary: ScoreSummary,
    pub submission: SubmissionStatus,
    pub completed_at: DateTime<Utc>,
    /// True when the deadline, not the last answer, ended the session.
    pub forced: bool,
}

/// Non-fatal problem surfaced to the user as a banner.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionWarning {
    #[error("question {} could not be graded: {}", .index + 1, .failure)]
    EvaluationFailed {
        index: usize,
        failure: EvaluationFailed,
    },

    #[error("your result was not saved: {0}")]
    SubmissionFailed(SubmissionFailed),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluateOutcome {
    /// The oracle answered (or failed) and the outcome was stored.
    Stored { index: usize, evaluation: Evaluation },
    /// Another evaluation is still in flight.
    Suppressed,
    /// The current question already has an evaluation.
    AlreadyEvaluated,
    /// Retry was requested but the stored evaluation did not fail, or retries are disabled.
    NothingToRetry,
    /// The session completed before the oracle answered; the result was dropped.
    Discarded,
    /// The session is no longer active.
    NotActive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The current question was unevaluated, so it was sent for grading instead.
    Evaluated(EvaluateOutcome),
    /// Grading of the current question is still in flight.
    Pending,
    Moved { index: usize },
    Completed(Completion),
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    /// The question was already graded; its answer is frozen.
    Frozen,
    /// The answer is with the oracle right now.
    Evaluating,
    /// The enforced deadline has passed.
    DeadlinePassed,
    Completed,
}

/// Everything the presentation layer needs to render one frame.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub test_id: String,
    pub title: String,
    pub description: String,
    pub phase: Phase,
    pub index: usize,
    pub question_count: usize,
    pub question: Option<Question>,
    pub answer: String,
    pub question_state: Option<QuestionState>,
    /// Stored feedback, or the sentinel when grading failed.
    pub feedback: Option<Feedback>,
    pub evaluation_failed: bool,
    pub remaining_secs: u64,
    pub completion: Option<Completion>,
    pub warning: Option<SessionWarning>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionState {
    index: usize,
    answers: Vec<String>,
    evaluations: Vec<Option<Evaluation>>,
    in_flight: Option<usize>,
    phase: Phase,
    completion: Option<Completion>,
    last_warning: Option<SessionWarning>,
}

impl SessionState {
    fn question_state(&self, index: usize) -> QuestionState {
        if self.in_flight == Some(index) {
            QuestionState::Evaluating
        } else if self.evaluations[index].is_some() {
            QuestionState::Evaluated
        } else {
            QuestionState::Unevaluated
        }
    }
}

/// One user's run through one test.
pub struct TestSession {
    id: Uuid,
    test: Arc<Test>,
    services: SessionServices,
    config: SessionConfig,
    started_at: DateTime<Utc>,
    timer: Mutex<SessionTimer>,
    timed: bool,
    state: Mutex<SessionState>,
}

impl TestSession {
    /// Load the catalog and open the requested test.
    pub async fn open(
        source: &dyn CatalogSource,
        test_id: &str,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let catalog = load_catalog(source).await?;
        Self::from_catalog(&catalog, test_id, services, config).await
    }

    /// Open a test from an already loaded catalog.
    pub async fn from_catalog(
        catalog: &Catalog,
        test_id: &str,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let test = catalog
            .get(test_id)
            .ok_or_else(|| SessionError::TestNotFound(test_id.to_string()))?;
        Ok(Self::start(test, services, config).await)
    }

    /// Start a session for a test. A test without questions completes at once.
    ///
    /// Must be called from within a tokio runtime (the timer is a spawned task).
    pub async fn start(test: Arc<Test>, services: SessionServices, config: SessionConfig) -> Self {
        let count = test.questions.len();
        let duration = test.duration_secs();

        let mut timer = SessionTimer::new();
        timer.start(duration);

        let session = Self {
            id: Uuid::new_v4(),
            test,
            services,
            config,
            started_at: Utc::now(),
            timer: Mutex::new(timer),
            timed: duration > 0,
            state: Mutex::new(SessionState {
                index: 0,
                answers: vec![String::new(); count],
                evaluations: vec![None; count],
                in_flight: None,
                phase: Phase::Active,
                completion: None,
                last_warning: None,
            }),
        };

        tracing::info!(
            session = %session.id,
            test = %session.test.id,
            questions = count,
            duration_secs = duration,
            "session started"
        );

        if count == 0 {
            session.complete(false).await;
        }
        session
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, SessionTimer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deadline_passed(&self) -> bool {
        self.config.deadline == DeadlinePolicy::Enforce
            && self.timed
            && self.lock_timer().is_expired()
    }

    // -- intents ------------------------------------------------------------

    /// Overwrite the current answer while its question is still unevaluated.
    pub fn edit_answer(&self, text: impl Into<String>) -> EditOutcome {
        let deadline_passed = self.deadline_passed();
        let mut state = self.lock();
        if state.phase == Phase::Completed {
            return EditOutcome::Completed;
        }
        if deadline_passed {
            return EditOutcome::DeadlinePassed;
        }
        let index = state.index;
        match state.question_state(index) {
            QuestionState::Evaluating => EditOutcome::Evaluating,
            QuestionState::Evaluated => EditOutcome::Frozen,
            QuestionState::Unevaluated => {
                state.answers[index] = text.into();
                EditOutcome::Updated
            }
        }
    }

    /// Step back one question. Returns the new index, or `None` at the start.
    pub fn retreat(&self) -> Option<usize> {
        let mut state = self.lock();
        if state.phase == Phase::Completed || state.index == 0 {
            return None;
        }
        state.index -= 1;
        Some(state.index)
    }

    /// Grade the current question, or move on if it is already graded.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn advance(&self) -> AdvanceOutcome {
        if let Some(completion) = self.enforce_deadline().await {
            return AdvanceOutcome::Completed(completion);
        }

        enum Next {
            Evaluate,
            Pending,
            Moved(usize),
            Complete,
            Done,
        }

        let next = {
            let mut state = self.lock();
            if state.phase == Phase::Completed {
                Next::Done
            } else {
                let index = state.index;
                match state.question_state(index) {
                    QuestionState::Unevaluated => Next::Evaluate,
                    QuestionState::Evaluating => Next::Pending,
                    QuestionState::Evaluated if index + 1 < state.answers.len() => {
                        state.index += 1;
                        Next::Moved(state.index)
                    }
                    QuestionState::Evaluated => Next::Complete,
                }
            }
        };

        match next {
            Next::Evaluate => AdvanceOutcome::Evaluated(self.evaluate().await),
            Next::Pending => AdvanceOutcome::Pending,
            Next::Moved(index) => {
                tracing::debug!(index, "moved to next question");
                AdvanceOutcome::Moved { index }
            }
            Next::Complete => match self.complete(false).await {
                Some(completion) => AdvanceOutcome::Completed(completion),
                None => AdvanceOutcome::AlreadyCompleted,
            },
            Next::Done => AdvanceOutcome::AlreadyCompleted,
        }
    }

    /// Send the current answer to the oracle.
    ///
    /// At most one evaluation is in flight at a time; concurrent calls are
    /// suppressed without reaching the oracle.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn evaluate(&self) -> EvaluateOutcome {
        if self.enforce_deadline().await.is_some() {
            return EvaluateOutcome::NotActive;
        }

        let (index, request) = {
            let mut state = self.lock();
            if state.phase == Phase::Completed {
                return EvaluateOutcome::NotActive;
            }
            if state.in_flight.is_some() {
                return EvaluateOutcome::Suppressed;
            }
            let index = state.index;
            if state.evaluations[index].is_some() {
                return EvaluateOutcome::AlreadyEvaluated;
            }
            state.in_flight = Some(index);
            (index, self.request_for(&state, index))
        };

        self.run_evaluation(index, request).await
    }

    /// Re-send the frozen answer of a question whose grading failed.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn retry_evaluation(&self) -> EvaluateOutcome {
        if self.enforce_deadline().await.is_some() {
            return EvaluateOutcome::NotActive;
        }

        let (index, request) = {
            let mut state = self.lock();
            if state.phase == Phase::Completed {
                return EvaluateOutcome::NotActive;
            }
            if state.in_flight.is_some() {
                return EvaluateOutcome::Suppressed;
            }
            let index = state.index;
            let failed = matches!(state.evaluations[index], Some(Err(_)));
            if !failed || !self.config.allow_retry_after_failure {
                return EvaluateOutcome::NothingToRetry;
            }
            state.in_flight = Some(index);
            (index, self.request_for(&state, index))
        };

        tracing::info!(index, "retrying failed evaluation");
        self.run_evaluation(index, request).await
    }

    /// Complete the session if the enforced deadline has passed.
    ///
    /// Returns the completion when this call ended the session. Unevaluated
    /// questions count as zero. Under [`DeadlinePolicy::Soft`] this never
    /// completes anything.
    pub async fn enforce_deadline(&self) -> Option<Completion> {
        if !self.deadline_passed() {
            return None;
        }
        if self.lock().phase == Phase::Completed {
            return None;
        }
        tracing::info!(session = %self.id, "deadline reached, completing session");
        self.complete(true).await
    }

    fn request_for(&self, state: &SessionState, index: usize) -> EvaluateRequest {
        EvaluateRequest {
            question: self.test.questions[index].content.clone(),
            answer: state.answers[index].clone(),
        }
    }

    async fn run_evaluation(&self, index: usize, request: EvaluateRequest) -> EvaluateOutcome {
        let marker = InFlight::new(self, index);
        let evaluation = self.services.oracle.evaluate(&request).await;

        let mut state = self.lock();
        marker.disarm();
        state.in_flight = None;
        if state.phase == Phase::Completed {
            tracing::warn!(index, "evaluation arrived after completion, discarding");
            return EvaluateOutcome::Discarded;
        }

        match &evaluation {
            Ok(feedback) => {
                tracing::info!(index, score = feedback.score, "answer evaluated");
                if matches!(
                    state.last_warning,
                    Some(SessionWarning::EvaluationFailed { index: i, .. }) if i == index
                ) {
                    state.last_warning = None;
                }
            }
            Err(failure) => {
                tracing::warn!(index, "evaluation failed: {failure}");
                state.last_warning = Some(SessionWarning::EvaluationFailed {
                    index,
                    failure: failure.clone(),
                });
            }
        }
        state.evaluations[index] = Some(evaluation.clone());
        EvaluateOutcome::Stored { index, evaluation }
    }

    /// Mark the session completed and submit the aggregate once.
    ///
    /// Returns `None` if the session was already completed.
    async fn complete(&self, forced: bool) -> Option<Completion> {
        let summary = {
            let mut state = self.lock();
            if state.phase == Phase::Completed {
                return None;
            }
            state.phase = Phase::Completed;
            let summary = ScoreSummary::compute(&state.evaluations);
            state.completion = Some(Completion {
                summary: summary.clone(),
                submission: SubmissionStatus::Pending,
                completed_at: Utc::now(),
                forced,
            });
            summary
        };
        self.lock_timer().stop();

        tracing::info!(
            session = %self.id,
            total = summary.total,
            max = summary.max,
            percentage = %summary.percentage_label(),
            forced,
            "session completed"
        );

        let submission = ResultSubmission {
            test_id: self.test.id.clone(),
            points: summary.total,
            is_done: true,
        };
        let result = self.services.sink.submit(&submission).await;

        let mut state = self.lock();
        let status = match result {
            Ok(()) => SubmissionStatus::Submitted,
            Err(e) => {
                tracing::warn!("result submission failed: {e}");
                state.last_warning = Some(SessionWarning::SubmissionFailed(e.clone()));
                SubmissionStatus::Failed(e)
            }
        };
        let completion = state.completion.as_mut()?;
        completion.submission = status;
        Some(completion.clone())
    }

    // -- reads --------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn test(&self) -> &Arc<Test> {
        &self.test
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn index(&self) -> usize {
        self.lock().index
    }

    pub fn answers(&self) -> Vec<String> {
        self.lock().answers.clone()
    }

    pub fn evaluations(&self) -> Vec<Option<Evaluation>> {
        self.lock().evaluations.clone()
    }

    /// Per-question feedback; failed gradings show the sentinel.
    pub fn feedbacks(&self) -> Vec<Option<Feedback>> {
        self.lock()
            .evaluations
            .iter()
            .map(|e| e.as_ref().map(display_feedback))
            .collect()
    }

    pub fn completion(&self) -> Option<Completion> {
        self.lock().completion.clone()
    }

    pub fn summary(&self) -> Option<ScoreSummary> {
        self.completion().map(|c| c.summary)
    }

    pub fn last_warning(&self) -> Option<SessionWarning> {
        self.lock().last_warning.clone()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.lock_timer().remaining()
    }

    /// Watch the countdown without polling the session.
    pub fn clock(&self) -> watch::Receiver<u64> {
        self.lock_timer().subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let remaining_secs = self.remaining_secs();
        let state = self.lock();
        let index = state.index;
        let has_question = index < state.answers.len();
        let evaluation = if has_question {
            state.evaluations[index].as_ref()
        } else {
            None
        };

        SessionSnapshot {
            session_id: self.id,
            test_id: self.test.id.clone(),
            title: self.test.title.clone(),
            description: self.test.description.clone(),
            phase: state.phase,
            index,
            question_count: state.answers.len(),
            question: self.test.questions.get(index).cloned(),
            answer: state.answers.get(index).cloned().unwrap_or_default(),
            question_state: has_question.then(|| state.question_state(index)),
            feedback: evaluation.map(display_feedback),
            evaluation_failed: matches!(evaluation, Some(Err(_))),
            remaining_secs,
            completion: state.completion.clone(),
            warning: state.last_warning.clone(),
        }
    }
}

/// Clears the in-flight marker if an evaluation future is dropped before the
/// oracle answers, leaving the question unevaluated.
struct InFlight<'a> {
    session: &'a TestSession,
    index: usize,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a TestSession, index: usize) -> Self {
        Self {
            session,
            index,
            armed: true,
        }
    }

    /// Called with the state lock held; the caller clears the marker itself.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.session.lock();
        if state.in_flight == Some(self.index) {
            state.in_flight = None;
            tracing::warn!(
                index = self.index,
                "evaluation cancelled before the oracle answered"
            );
        }
    }
}

fn display_feedback(evaluation: &Evaluation) -> Feedback {
    match evaluation {
        Ok(feedback) => feedback.clone(),
        Err(failure) => failure.sentinel_feedback(),
    }
}
