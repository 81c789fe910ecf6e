//! HTTP scoring oracle client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use finquiz_core::error::EvaluationFailed;
use finquiz_core::model::Feedback;
use finquiz_core::traits::{EvaluateRequest, ScoringOracle};

use crate::error::ClientError;
use crate::http::{build_client, join_url, send_json};

pub const DEFAULT_EVALUATE_PATH: &str = "/ask-ai";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Grades answers by POSTing them to a remote oracle.
///
/// One request per call; a timeout, transport error, non-2xx status or
/// undecodable body all surface as [`EvaluationFailed`].
pub struct HttpScoringOracle {
    url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpScoringOracle {
    pub fn new(base_url: &str, evaluate_path: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            url: join_url(base_url, evaluate_path),
            timeout_secs,
            client: build_client(timeout_secs)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, request: &EvaluateRequest) -> Result<Feedback, ClientError> {
        let reply: OracleReply = send_json(
            self.client.post(&self.url).json(request),
            self.timeout_secs,
        )
        .await?;

        let OracleFeedback { score, description } = match reply {
            OracleReply::Wrapped { response } => response,
            OracleReply::Bare(feedback) => feedback,
        };
        Ok(Feedback::new(score, description))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OracleReply {
    Wrapped { response: OracleFeedback },
    Bare(OracleFeedback),
}

#[derive(Deserialize)]
struct OracleFeedback {
    score: f64,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(url = %self.url, answer_len = request.answer.len()))]
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<Feedback, EvaluationFailed> {
        match self.request(request).await {
            Ok(feedback) => {
                tracing::debug!(score = feedback.score, "answer graded");
                Ok(feedback)
            }
            Err(e) => {
                tracing::warn!(error = %e, "oracle request failed");
                Err(e.into())
            }
        }
    }
}
