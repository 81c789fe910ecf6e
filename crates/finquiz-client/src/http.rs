//! Shared request plumbing for the platform and oracle clients.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::ClientError;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ClientError::ClientBuild(e.to_string()))
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout_secs: u64,
) -> Result<T, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::from_send(e, timeout_secs))?;

    let status = response.status().as_u16();
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::ApiError {
            status,
            message: error_message(body),
        });
    }

    // A body that stops arriving is a transport failure, not a bad payload.
    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::from_send(e, timeout_secs))?;
    serde_json::from_slice::<T>(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Pull `error` or `message` out of a JSON error body, else keep the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquiz_core::error::SubmissionFailed;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("http://host:8000/", "/ask-ai"),
            "http://host:8000/ask-ai"
        );
        assert_eq!(
            join_url("http://host", "api/tests-list"),
            "http://host/api/tests-list"
        );
    }

    /// Serve one response that promises more body than it sends, then hang up.
    async fn truncated_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                      content-length: 100\r\n\r\n{\"success\":",
                )
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn truncated_body_is_a_network_error() {
        let url = truncated_server().await;
        let client = build_client(5).unwrap();

        let request = client.post(join_url(&url, "/api/user-points"));
        let err = send_json::<serde_json::Value>(request, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NetworkError(_)), "got {err:?}");

        let failed: SubmissionFailed = err.into();
        assert!(matches!(failed, SubmissionFailed::NetworkError(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let client = build_client(5).unwrap();

        let err = send_json::<serde_json::Value>(client.get(server.uri()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn error_message_prefers_json_field() {
        assert_eq!(
            error_message(r#"{"error":"Missing required fields"}"#.into()),
            "Missing required fields"
        );
        assert_eq!(error_message("bad gateway".into()), "bad gateway");
    }
}
