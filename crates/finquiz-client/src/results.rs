//! HTTP result submission client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use finquiz_core::context::SessionContext;
use finquiz_core::error::SubmissionFailed;
use finquiz_core::traits::{ResultSink, ResultSubmission};

use crate::config::PlatformConfig;
use crate::error::ClientError;
use crate::http::{build_client, join_url, send_json};

/// Persists a finished session's points. Each call is one POST; no retries.
pub struct HttpResultClient {
    url: String,
    timeout_secs: u64,
    context: SessionContext,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SubmitResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

impl HttpResultClient {
    pub fn new(platform: &PlatformConfig, context: SessionContext) -> Result<Self, ClientError> {
        Ok(Self {
            url: join_url(&platform.base_url, &platform.submit_path),
            timeout_secs: platform.timeout_secs,
            context,
            client: build_client(platform.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ResultSink for HttpResultClient {
    #[instrument(skip(self, submission), fields(url = %self.url, test = %submission.test_id, points = submission.points))]
    async fn submit(&self, submission: &ResultSubmission) -> Result<(), SubmissionFailed> {
        let mut request = self.client.post(&self.url).json(submission);
        if let Some(bearer) = self.context.bearer() {
            request = request.header("Authorization", bearer);
        }

        let response: SubmitResponse =
            send_json(request, self.timeout_secs).await.map_err(|e| {
                tracing::warn!(error = %e, "result submission failed");
                SubmissionFailed::from(e)
            })?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "server reported failure".to_string());
            tracing::warn!(%message, "result rejected");
            return Err(SubmissionFailed::ServerRejected(message));
        }

        tracing::info!("result saved");
        Ok(())
    }
}
