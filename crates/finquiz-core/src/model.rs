//! Core data model types for finquiz.
//!
//! These are the types the platform exchanges over the wire and that the
//! session controller works with: tests, questions, feedback, and the user's
//! historical point records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest score the oracle can award for a single answer.
pub const MAX_QUESTION_SCORE: f64 = 10.0;

/// A graded test as published in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    /// Unique identifier for this test.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Short description shown in the catalog.
    #[serde(default)]
    pub description: String,
    /// Difficulty badge.
    pub difficulty: Difficulty,
    /// Allotted time in minutes.
    #[serde(rename = "estimated_time")]
    pub estimated_minutes: u32,
    /// Category used for catalog filtering.
    #[serde(default)]
    pub category: String,
    /// Whether the test is flagged as newly added.
    #[serde(default)]
    pub is_new: bool,
    /// Ordered questions.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Test {
    /// Allotted duration in seconds, used to seed the session timer.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.estimated_minutes) * 60
    }

    /// Highest aggregate score achievable on this test.
    pub fn max_score(&self) -> f64 {
        self.questions.len() as f64 * MAX_QUESTION_SCORE
    }
}

/// A single open-ended question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Ordinal identifier within the test.
    pub question_id: u32,
    /// The question text.
    pub content: String,
}

/// Test difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Oracle verdict for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Score between 0 and [`MAX_QUESTION_SCORE`].
    pub score: f64,
    /// Markdown critique of the answer.
    pub description: String,
}

impl Feedback {
    /// Build feedback, clamping the score into the valid range.
    pub fn new(score: f64, description: impl Into<String>) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, MAX_QUESTION_SCORE)
        } else {
            0.0
        };
        Self {
            score,
            description: description.into(),
        }
    }
}

/// A user's recorded result for one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPoints {
    pub user_id: String,
    pub test_id: String,
    pub points: f64,
    pub is_done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_display_and_parse() {
        assert_eq!(Difficulty::Medium.to_string(), "medium");
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn feedback_score_is_clamped() {
        assert_eq!(Feedback::new(12.0, "").score, 10.0);
        assert_eq!(Feedback::new(-3.0, "").score, 0.0);
        assert_eq!(Feedback::new(f64::NAN, "").score, 0.0);
        assert_eq!(Feedback::new(7.5, "ok").score, 7.5);
    }

    #[test]
    fn test_deserializes_from_platform_json() {
        let json = serde_json::json!({
            "id": "1",
            "title": "Budgeting Basics",
            "description": "Plan a monthly budget",
            "difficulty": "easy",
            "estimated_time": 15,
            "questions_count": 2,
            "category": "Budgeting",
            "is_new": true,
            "questions": [
                {"question_id": 1, "content": "What is a budget?"},
                {"question_id": 2, "content": "Name two fixed expenses."}
            ]
        });
        let test: Test = serde_json::from_value(json).unwrap();
        assert_eq!(test.difficulty, Difficulty::Easy);
        assert_eq!(test.duration_secs(), 900);
        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.max_score(), 20.0);
    }
}
