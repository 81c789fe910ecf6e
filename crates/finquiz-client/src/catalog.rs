//! HTTP catalog client for the learning platform.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use finquiz_core::context::SessionContext;
use finquiz_core::model::{Test, UserPoints};
use finquiz_core::traits::CatalogSource;

use crate::config::PlatformConfig;
use crate::error::ClientError;
use crate::http::{build_client, join_url, send_json};

/// Fetches published tests and the user's point records.
pub struct HttpCatalogClient {
    tests_url: String,
    points_url: String,
    timeout_secs: u64,
    context: SessionContext,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TestsResponse {
    #[serde(default)]
    tests: Vec<Test>,
}

#[derive(Deserialize)]
struct PointsResponse {
    #[serde(default)]
    points: Vec<UserPoints>,
}

impl HttpCatalogClient {
    pub fn new(platform: &PlatformConfig, context: SessionContext) -> Result<Self, ClientError> {
        Ok(Self {
            tests_url: join_url(&platform.base_url, &platform.tests_path),
            points_url: join_url(&platform.base_url, &platform.points_path),
            timeout_secs: platform.timeout_secs,
            context,
            client: build_client(platform.timeout_secs)?,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match self.context.bearer() {
            Some(bearer) => request.header("Authorization", bearer),
            None => request,
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    #[instrument(skip(self), fields(url = %self.tests_url))]
    async fn fetch_tests(&self) -> anyhow::Result<Vec<Test>> {
        let response: TestsResponse = send_json(self.get(&self.tests_url), self.timeout_secs).await?;
        tracing::debug!(count = response.tests.len(), "fetched tests");
        Ok(response.tests)
    }

    #[instrument(skip(self), fields(url = %self.points_url, user = %self.context.user_id))]
    async fn fetch_points(&self) -> anyhow::Result<Vec<UserPoints>> {
        let response: PointsResponse =
            send_json(self.get(&self.points_url), self.timeout_secs).await?;

        let points = scope_points(response.points, &self.context.user_id);
        tracing::debug!(count = points.len(), "fetched user points");
        Ok(points)
    }
}

/// Keep only the records that belong to `user_id`.
///
/// Without a configured user the platform is trusted to scope the reply to the
/// bearer; a reply mixing several users is ignored rather than guessed at.
fn scope_points(points: Vec<UserPoints>, user_id: &str) -> Vec<UserPoints> {
    if !user_id.is_empty() {
        return points.into_iter().filter(|p| p.user_id == user_id).collect();
    }

    let users: BTreeSet<&str> = points.iter().map(|p| p.user_id.as_str()).collect();
    if users.len() > 1 {
        tracing::warn!(
            users = users.len(),
            "points reply covers several users and no user_id is configured, ignoring it"
        );
        return Vec::new();
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquiz_core::catalog::load_catalog;
    use finquiz_core::error::SessionError;
    use finquiz_core::model::Difficulty;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn platform(server: &MockServer) -> PlatformConfig {
        PlatformConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..PlatformConfig::default()
        }
    }

    fn tests_body() -> serde_json::Value {
        serde_json::json!({
            "tests": [{
                "id": "1",
                "title": "Investing Basics",
                "description": "Stocks, bonds and funds",
                "difficulty": "medium",
                "estimated_time": 20,
                "questions_count": 2,
                "category": "Investing",
                "is_new": false,
                "questions": [
                    {"question_id": 1, "content": "What is a bond?"},
                    {"question_id": 2, "content": "What is an index fund?"}
                ]
            }]
        })
    }

    #[tokio::test]
    async fn fetches_tests_with_bearer() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tests-list"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tests_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpCatalogClient::new(&platform(&server), SessionContext::new("1").with_token("tok"))
                .unwrap();
        let tests = client.fetch_tests().await.unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].difficulty, Difficulty::Medium);
        assert_eq!(tests[0].estimated_minutes, 20);
        assert_eq!(tests[0].questions[1].content, "What is an index fund?");
    }

    #[tokio::test]
    async fn filters_points_to_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/user-points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "points": [
                    {"user_id": "1", "test_id": "1", "points": 14, "is_done": true},
                    {"user_id": "2", "test_id": "1", "points": 3, "is_done": true}
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpCatalogClient::new(&platform(&server), SessionContext::new("1")).unwrap();
        let points = client.fetch_points().await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].points, 14.0);
    }

    #[tokio::test]
    async fn mixed_users_without_user_id_are_ignored() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/user-points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "points": [
                    {"user_id": "1", "test_id": "1", "points": 14, "is_done": true},
                    {"user_id": "2", "test_id": "1", "points": 3, "is_done": false}
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpCatalogClient::new(&platform(&server), SessionContext::new("")).unwrap();
        assert!(client.fetch_points().await.unwrap().is_empty());
    }

    #[test]
    fn single_user_reply_is_trusted_without_user_id() {
        let record = |user: &str, test: &str| UserPoints {
            user_id: user.into(),
            test_id: test.into(),
            points: 8.0,
            is_done: true,
        };
        let points = scope_points(vec![record("9", "1"), record("9", "2")], "");
        assert_eq!(points.len(), 2);

        let points = scope_points(vec![record("9", "1"), record("4", "2")], "4");
        assert_eq!(points, vec![record("4", "2")]);
    }

    #[tokio::test]
    async fn load_catalog_over_http() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tests-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tests_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user-points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "points": [{"user_id": "1", "test_id": "1", "points": 12.5, "is_done": true}]
            })))
            .mount(&server)
            .await;

        let client = HttpCatalogClient::new(&platform(&server), SessionContext::new("1")).unwrap();
        let catalog = load_catalog(&client).await.unwrap();
        assert_eq!(catalog.points_for("1"), 12.5);
        assert!(catalog.is_completed("1"));
    }

    #[tokio::test]
    async fn points_failure_makes_catalog_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tests-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tests_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user-points"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "Failed to fetch user points"})),
            )
            .mount(&server)
            .await;

        let client = HttpCatalogClient::new(&platform(&server), SessionContext::default()).unwrap();
        let err = load_catalog(&client).await.unwrap_err();
        match err {
            SessionError::CatalogUnavailable(message) => {
                assert!(message.contains("Failed to fetch user points"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
