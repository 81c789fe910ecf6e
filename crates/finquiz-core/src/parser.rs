//! TOML test bank parser.
//!
//! Loads tests from bank files and directories, validates them, and serves a
//! loaded bank as a [`CatalogSource`] for offline practice.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Difficulty, Question, Test, UserPoints};
use crate::traits::CatalogSource;

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    #[serde(default)]
    tests: Vec<TomlTest>,
}

#[derive(Debug, Deserialize)]
struct TomlTest {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    #[serde(default = "default_minutes")]
    estimated_time: u32,
    #[serde(default)]
    category: String,
    #[serde(default)]
    is_new: bool,
    #[serde(default)]
    questions: Vec<String>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_minutes() -> u32 {
    15
}

/// Parse a single bank file.
pub fn parse_bank(path: &Path) -> Result<Vec<Test>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into tests (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<Vec<Test>> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    parsed
        .tests
        .into_iter()
        .map(|t| -> Result<Test> {
            let difficulty: Difficulty = t
                .difficulty
                .parse()
                .map_err(|e: String| anyhow::anyhow!("test '{}': {}", t.id, e))?;

            let questions = t
                .questions
                .into_iter()
                .enumerate()
                .map(|(i, content)| Question {
                    question_id: i as u32 + 1,
                    content: content.trim().to_string(),
                })
                .collect();

            Ok(Test {
                id: t.id,
                title: t.title,
                description: t.description,
                difficulty,
                estimated_minutes: t.estimated_time,
                category: t.category,
                is_new: t.is_new,
                questions,
            })
        })
        .collect()
}

/// Load a bank file, or every `.toml` bank under a directory.
pub fn load_bank(path: &Path) -> Result<Vec<Test>> {
    if !path.is_dir() {
        return parse_bank(path);
    }

    let mut tests = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory: {}", path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            tests.extend(load_bank(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(parsed) => tests.extend(parsed),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(tests)
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The test ID (if applicable).
    pub test_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a bank for common issues.
pub fn validate_bank(tests: &[Test]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for test in tests {
        if !seen_ids.insert(&test.id) {
            warnings.push(ValidationWarning {
                test_id: Some(test.id.clone()),
                message: format!("duplicate test ID: {}", test.id),
            });
        }
    }

    for test in tests {
        if test.questions.is_empty() {
            warnings.push(ValidationWarning {
                test_id: Some(test.id.clone()),
                message: "test has no questions and will complete immediately".into(),
            });
        }

        for q in test.questions.iter().filter(|q| q.content.is_empty()) {
            warnings.push(ValidationWarning {
                test_id: Some(test.id.clone()),
                message: format!("question {} is empty", q.question_id),
            });
        }

        if test.estimated_minutes == 0 {
            warnings.push(ValidationWarning {
                test_id: Some(test.id.clone()),
                message: "estimated_time is 0; the session will be untimed".into(),
            });
        }
    }

    warnings
}

/// A bank served as a catalog. It holds no point records.
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    tests: Vec<Test>,
}

impl LocalCatalog {
    pub fn new(tests: Vec<Test>) -> Self {
        Self { tests }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_bank(path)?))
    }
}

#[async_trait]
impl CatalogSource for LocalCatalog {
    async fn fetch_tests(&self) -> Result<Vec<Test>> {
        Ok(self.tests.clone())
    }

    async fn fetch_points(&self) -> Result<Vec<UserPoints>> {
        Ok(Vec::new())
    }
}
