//! Test catalog loading and lookups.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::instrument;

use crate::error::SessionError;
use crate::model::{Difficulty, Test, UserPoints};
use crate::traits::CatalogSource;

/// Tests plus the user's historical point records, fetched together.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tests: Vec<Arc<Test>>,
    points: HashMap<String, UserPoints>,
}

/// Catalog filter matching the test-selection screen.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
}

impl Catalog {
    pub fn new(tests: Vec<Test>, points: Vec<UserPoints>) -> Self {
        Self {
            tests: tests.into_iter().map(Arc::new).collect(),
            points: points
                .into_iter()
                .map(|p| (p.test_id.clone(), p))
                .collect(),
        }
    }

    pub fn tests(&self) -> &[Arc<Test>] {
        &self.tests
    }

    pub fn get(&self, test_id: &str) -> Option<Arc<Test>> {
        self.tests.iter().find(|t| t.id == test_id).cloned()
    }

    /// Points recorded for a test, 0 if the user never took it.
    pub fn points_for(&self, test_id: &str) -> f64 {
        self.points.get(test_id).map(|p| p.points).unwrap_or(0.0)
    }

    /// Whether the user has completed a test, false if never taken.
    pub fn is_completed(&self, test_id: &str) -> bool {
        self.points.get(test_id).is_some_and(|p| p.is_done)
    }

    /// Unique categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.tests
            .iter()
            .map(|t| t.category.clone())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter(&self, filter: &CatalogFilter) -> Vec<Arc<Test>> {
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        self.tests
            .iter()
            .filter(|t| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|c| t.category == c)
            })
            .filter(|t| filter.difficulty.is_none_or(|d| t.difficulty == d))
            .filter(|t| {
                needle.as_deref().is_none_or(|n| {
                    t.title.to_lowercase().contains(n) || t.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect()
    }
}

/// Fetch tests and points concurrently.
///
/// Both requests must succeed; a partial result is discarded and reported as
/// [`SessionError::CatalogUnavailable`].
#[instrument(skip(source))]
pub async fn load_catalog(source: &dyn CatalogSource) -> Result<Catalog, SessionError> {
    let (tests, points) = futures::try_join!(source.fetch_tests(), source.fetch_points())
        .map_err(|e| {
            tracing::warn!("catalog load failed: {e:#}");
            SessionError::CatalogUnavailable(format!("{e:#}"))
        })?;

    tracing::info!(tests = tests.len(), points = points.len(), "catalog loaded");
    Ok(Catalog::new(tests, points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Question;
    use async_trait::async_trait;

    fn test(id: &str, title: &str, category: &str, difficulty: Difficulty) -> Test {
        Test {
            id: id.into(),
            title: title.into(),
            description: format!("About {title}"),
            difficulty,
            estimated_minutes: 10,
            category: category.into(),
            is_new: false,
            questions: vec![Question {
                question_id: 1,
                content: "Why?".into(),
            }],
        }
    }

    fn sample() -> Catalog {
        Catalog::new(
            vec![
                test("1", "Budgeting Basics", "Budgeting", Difficulty::Easy),
                test("2", "Compound Interest", "Investing", Difficulty::Medium),
                test("3", "Options Pricing", "Investing", Difficulty::Hard),
            ],
            vec![UserPoints {
                user_id: "u".into(),
                test_id: "2".into(),
                points: 17.0,
                is_done: true,
            }],
        )
    }

    struct FakeSource {
        tests_ok: bool,
        points_ok: bool,
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch_tests(&self) -> anyhow::Result<Vec<Test>> {
            anyhow::ensure!(self.tests_ok, "tests endpoint returned 500");
            Ok(vec![test("1", "Budgeting Basics", "Budgeting", Difficulty::Easy)])
        }

        async fn fetch_points(&self) -> anyhow::Result<Vec<UserPoints>> {
            anyhow::ensure!(self.points_ok, "points endpoint returned 500");
            Ok(vec![])
        }
    }

    #[test]
    fn lookups_default_when_absent() {
        let catalog = sample();
        assert_eq!(catalog.points_for("2"), 17.0);
        assert!(catalog.is_completed("2"));
        assert_eq!(catalog.points_for("1"), 0.0);
        assert!(!catalog.is_completed("1"));
        assert!(!catalog.is_completed("missing"));
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn categories_are_unique_and_sorted() {
        assert_eq!(sample().categories(), vec!["Budgeting", "Investing"]);
    }

    #[test]
    fn filter_combines_criteria() {
        let catalog = sample();
        let investing = catalog.filter(&CatalogFilter {
            category: Some("Investing".into()),
            ..Default::default()
        });
        assert_eq!(investing.len(), 2);

        let hard = catalog.filter(&CatalogFilter {
            category: Some("Investing".into()),
            difficulty: Some(Difficulty::Hard),
            search: None,
        });
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].id, "3");

        let search = catalog.filter(&CatalogFilter {
            search: Some("  about BUDGETING ".into()),
            ..Default::default()
        });
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].id, "1");

        assert_eq!(catalog.filter(&CatalogFilter::default()).len(), 3);
    }

    #[tokio::test]
    async fn load_succeeds_when_both_fetches_succeed() {
        let source = FakeSource {
            tests_ok: true,
            points_ok: true,
        };
        let catalog = load_catalog(&source).await.unwrap();
        assert_eq!(catalog.tests().len(), 1);
    }

    #[tokio::test]
    async fn partial_failure_is_total_failure() {
        for (tests_ok, points_ok) in [(true, false), (false, true), (false, false)] {
            let source = FakeSource {
                tests_ok,
                points_ok,
            };
            let err = load_catalog(&source).await.unwrap_err();
            assert!(matches!(err, SessionError::CatalogUnavailable(_)));
        }
    }
}
