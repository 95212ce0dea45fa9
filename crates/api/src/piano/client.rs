//! HTTP client for the Piano Analytics `getData` endpoint.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::reduce::GetDataResponse;
use super::{DataQuery, PianoError};

/// Longest upstream error excerpt ever surfaced to a caller.
const MAX_UPSTREAM_MESSAGE_LEN: usize = 200;

/// Thin client over one Piano query shape.
///
/// One call per user action, bounded by the configured timeout, no retries.
/// The caller-supplied API key travels only in the `X-API-Key` header —
/// never in the URL, and never in a log line.
#[derive(Debug, Clone)]
pub struct PianoClient {
    http: reqwest::Client,
    base_url: String,
}

impl PianoClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the TLS backend cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Execute `query` authenticated as `api_key` and parse the response.
    ///
    /// # Errors
    ///
    /// - [`PianoError::Transport`] for timeouts and connection-level failures.
    /// - [`PianoError::Api`] for any upstream status ≥ 400, or a body that is
    ///   not a JSON object; carries the upstream status and a ≤200-character
    ///   excerpt of its error message.
    pub async fn get_data(
        &self,
        api_key: &str,
        query: &DataQuery,
    ) -> Result<GetDataResponse, PianoError> {
        let param = serde_json::to_string(query)
            .map_err(|e| PianoError::Internal(format!("query serialisation failed: {e}")))?;

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("param", param.as_str())])
            .header("X-API-Key", api_key)
            .send()
            .await
            .map_err(|e| PianoError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PianoError::Transport(e.to_string()))?;

        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let is_object = matches!(parsed, Some(Value::Object(_)));
        if status >= 400 || !is_object {
            let message = truncate(&upstream_message(parsed.as_ref(), &body));
            warn!(status, message = %message, "Piano API returned an error");
            return Err(PianoError::Api { status, message });
        }

        // parsed is Some(Object) here; shape mismatches inside it still fail
        // closed as an upstream error rather than a panic.
        serde_json::from_value(parsed.unwrap_or_default()).map_err(|_| PianoError::Api {
            status,
            message: "unexpected response shape".into(),
        })
    }
}

/// Pick the most useful error text out of an upstream body: `message`, then
/// `error.message`, then the raw body itself.
fn upstream_message(parsed: Option<&Value>, raw_body: &str) -> String {
    parsed
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error").and_then(|e| e.get("message")))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| raw_body.to_owned())
}

/// Truncate to [`MAX_UPSTREAM_MESSAGE_LEN`] characters on a char boundary.
fn truncate(message: &str) -> String {
    message.chars().take(MAX_UPSTREAM_MESSAGE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn client(server: &MockServer) -> PianoClient {
        PianoClient::new(server.url("/v3/data/getData"), Duration::from_secs(2)).unwrap()
    }

    fn query() -> DataQuery {
        DataQuery::for_test("T1", 42, "2024-01-01", "2024-01-31")
    }

    #[tokio::test]
    async fn key_rides_the_header_and_query_rides_param() {
        let server = MockServer::start_async().await;
        let expected_param = serde_json::to_string(&query()).unwrap();
        let mock = server
            .mock_async(|when, then| {
                // Exact `param` match: the only query parameter is the
                // serialised query, so the key cannot ride the URL.
                when.method(httpmock::Method::GET)
                    .path("/v3/data/getData")
                    .header("X-API-Key", "the-plain-key")
                    .query_param("param", expected_param.as_str());
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"DataFeed":[{"Rows":[]}]}"#);
            })
            .await;

        let resp = client(&server)
            .get_data("the-plain-key", &query())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(resp.data_feed.len(), 1);
        assert!(resp.data_feed[0].rows.is_empty());
    }

    #[tokio::test]
    async fn upstream_403_yields_api_error_with_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(403)
                    .header("content-type", "application/json")
                    .body(r#"{"message":"forbidden"}"#);
            })
            .await;

        let err = client(&server).get_data("k", &query()).await.unwrap_err();
        match err {
            PianoError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nested_error_message_is_extracted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(500)
                    .header("content-type", "application/json")
                    .body(r#"{"error":{"message":"boom"}}"#);
            })
            .await;

        let err = client(&server).get_data("k", &query()).await.unwrap_err();
        match err {
            PianoError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_upstream_message_is_truncated() {
        let server = MockServer::start_async().await;
        let body = serde_json::json!({ "message": "x".repeat(1000) }).to_string();
        server
            .mock_async(move |when, then| {
                when.method(httpmock::Method::GET);
                then.status(400)
                    .header("content-type", "application/json")
                    .body(body);
            })
            .await;

        let err = client(&server).get_data("k", &query()).await.unwrap_err();
        match err {
            PianoError::Api { message, .. } => {
                assert_eq!(message.chars().count(), MAX_UPSTREAM_MESSAGE_LEN)
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_200_body_is_an_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let err = client(&server).get_data("k", &query()).await.unwrap_err();
        match err {
            PianoError::Api { status, message } => {
                assert_eq!(status, 200);
                assert!(message.contains("maintenance"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        // Port 9 (discard) on localhost: nothing listens there.
        let client = PianoClient::new(
            "http://127.0.0.1:9/v3/data/getData",
            Duration::from_millis(500),
        )
        .unwrap();
        let err = client.get_data("k", &query()).await.unwrap_err();
        assert!(matches!(err, PianoError::Transport(_)));
    }
}
