//! Aggregate scoring for a finished session.

use serde::{Deserialize, Serialize};

use crate::error::EvaluationFailed;
use crate::model::{Feedback, MAX_QUESTION_SCORE};

/// Outcome of grading one question.
pub type Evaluation = Result<Feedback, EvaluationFailed>;

/// Final score of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Sum of per-question scores.
    pub total: f64,
    /// `questions * 10`.
    pub max: f64,
    /// Rounded percentage, `None` when the test had no questions.
    pub percentage: Option<u32>,
}

impl ScoreSummary {
    /// Sum every slot; failed or missing evaluations count as zero.
    pub fn compute(evaluations: &[Option<Evaluation>]) -> Self {
        let total: f64 = evaluations
            .iter()
            .map(|e| match e {
                Some(Ok(feedback)) => feedback.score,
                Some(Err(_)) | None => 0.0,
            })
            .sum();
        let max = evaluations.len() as f64 * MAX_QUESTION_SCORE;
        let percentage = if max > 0.0 {
            Some((total / max * 100.0).round() as u32)
        } else {
            None
        };
        Self {
            total,
            max,
            percentage,
        }
    }

    /// Percentage for display, "N/A" for an empty test.
    pub fn percentage_label(&self) -> String {
        match self.percentage {
            Some(p) => format!("{p}%"),
            None => "N/A".to_string(),
        }
    }

    pub fn tier(&self) -> Option<ScoreTier> {
        self.percentage.map(ScoreTier::for_percentage)
    }
}

/// Banding used for colors and encouragement messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Excellent,
    Good,
    NeedsPractice,
}

impl ScoreTier {
    /// Band for a whole-test percentage (>= 80, >= 60).
    pub fn for_percentage(percent: u32) -> Self {
        if percent >= 80 {
            ScoreTier::Excellent
        } else if percent >= 60 {
            ScoreTier::Good
        } else {
            ScoreTier::NeedsPractice
        }
    }

    /// Band for a single question score (>= 8, >= 5).
    pub fn for_question(score: f64) -> Self {
        if score >= 8.0 {
            ScoreTier::Excellent
        } else if score >= 5.0 {
            ScoreTier::Good
        } else {
            ScoreTier::NeedsPractice
        }
    }

    pub fn achievement_message(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Outstanding! You've mastered this topic.",
            ScoreTier::Good => "Good job! You have a solid understanding.",
            ScoreTier::NeedsPractice => "Keep practicing! You're on your way to mastery.",
        }
    }

    pub fn feedback_message(self) -> &'static str {
        match self {
            ScoreTier::Excellent => {
                "Excellent work! You've shown great understanding of the topic."
            }
            ScoreTier::Good => "Good effort! Review the feedback to improve your understanding.",
            ScoreTier::NeedsPractice => "Keep practicing! Review the concepts and try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(score: f64) -> Option<Evaluation> {
        Some(Ok(Feedback::new(score, "")))
    }

    #[test]
    fn sums_three_questions() {
        let summary = ScoreSummary::compute(&[scored(7.0), scored(10.0), scored(4.0)]);
        assert_eq!(summary.total, 21.0);
        assert_eq!(summary.max, 30.0);
        assert_eq!(summary.percentage, Some(70));
        assert_eq!(summary.percentage_label(), "70%");
        assert_eq!(summary.tier(), Some(ScoreTier::Good));
    }

    #[test]
    fn failures_and_gaps_count_zero() {
        let summary = ScoreSummary::compute(&[
            scored(9.0),
            Some(Err(EvaluationFailed::new("timeout"))),
            None,
        ]);
        assert_eq!(summary.total, 9.0);
        assert_eq!(summary.max, 30.0);
        assert_eq!(summary.percentage, Some(30));
    }

    #[test]
    fn empty_test_has_no_percentage() {
        let summary = ScoreSummary::compute(&[]);
        assert_eq!(summary.total, 0.0);
        assert_eq!(summary.max, 0.0);
        assert_eq!(summary.percentage, None);
        assert_eq!(summary.percentage_label(), "N/A");
        assert_eq!(summary.tier(), None);
    }

    #[test]
    fn tiers() {
        assert_eq!(ScoreTier::for_percentage(80), ScoreTier::Excellent);
        assert_eq!(ScoreTier::for_percentage(79), ScoreTier::Good);
        assert_eq!(ScoreTier::for_percentage(59), ScoreTier::NeedsPractice);
        assert_eq!(ScoreTier::for_question(8.0), ScoreTier::Excellent);
        assert_eq!(ScoreTier::for_question(5.0), ScoreTier::Good);
        assert_eq!(ScoreTier::for_question(4.5), ScoreTier::NeedsPractice);
    }
}
