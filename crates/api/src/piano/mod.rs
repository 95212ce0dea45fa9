//! Piano Analytics proxy: decrypt the stored credential just-in-time, run
//! one `getData` query on the user's behalf, and reduce the response.
//!
//! The raw API key exists in memory only for the duration of one
//! [`fetch_aggregated_variations`] call; it is never stored decrypted,
//! echoed to the caller, or written to a log line.

pub mod client;
pub mod query;
pub mod reduce;

pub use client::PianoClient;
pub use query::DataQuery;

use common::protocol::{PianoProxyRequest, PianoProxyResponse};
use common::ServiceError;
use thiserror::Error;
use tracing::debug;

use crate::crypto::cipher;
use crate::key::MasterKeyStore;
use crate::store::{MetaStore, StoreError, PIANO_API_KEY_META, PIANO_SITE_ID_META};

/// Errors produced by the proxy pipeline, each mapping to a distinct
/// caller-visible outcome.
#[derive(Debug, Error)]
pub enum PianoError {
    /// No stored credential (API key blob and/or site id) for this user.
    #[error("Piano credential not configured for this user")]
    ConfigMissing,

    /// The caller omitted a query parameter.
    #[error("missing proxy parameter: {0}")]
    MissingParams(&'static str),

    /// The stored site id is not a number; the credential must be re-saved.
    #[error("stored Piano site id is not numeric")]
    InvalidSiteId,

    /// The server master key is absent or invalid; nothing can be decrypted.
    #[error("master key unavailable")]
    KeyUnavailable,

    /// The stored blob would not decrypt — usually a master key mismatch.
    #[error("credential decryption failed: {0}")]
    Decryption(String),

    /// Transport-level failure reaching Piano.
    #[error("Piano request failed: {0}")]
    Transport(String),

    /// Piano answered with an error status or an unparsable body.
    #[error("Piano API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Storage collaborator failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Unexpected internal failure.
    #[error("internal proxy error: {0}")]
    Internal(String),
}

impl From<StoreError> for PianoError {
    fn from(e: StoreError) -> Self {
        PianoError::Storage(e.to_string())
    }
}

impl From<PianoError> for ServiceError {
    fn from(e: PianoError) -> Self {
        match e {
            PianoError::ConfigMissing => ServiceError::BadRequest {
                code: "piano_config_missing",
                message: "Piano Analytics configuration (API key or site id) is missing \
                          for this user. Save it in the Piano Analytics configuration \
                          section of the tool."
                    .into(),
            },
            PianoError::MissingParams(which) => ServiceError::BadRequest {
                code: "missing_proxy_params",
                message: format!("missing parameter for the Piano proxy request: {which}"),
            },
            PianoError::InvalidSiteId => ServiceError::BadRequest {
                code: "invalid_site_id",
                message: "the stored Piano site id is not numeric; please re-save your \
                          Piano configuration"
                    .into(),
            },
            PianoError::KeyUnavailable => ServiceError::Configuration(
                "server encryption key is not configured; credential decryption is \
                 disabled"
                    .into(),
            ),
            PianoError::Decryption(_) => ServiceError::Decryption(
                "failed to decrypt the stored Piano API key. Check the server \
                 encryption key, then re-save your credential."
                    .into(),
            ),
            PianoError::Transport(msg) => ServiceError::UpstreamUnreachable(format!(
                "error communicating with the Piano API: {msg}"
            )),
            PianoError::Api { status, message } => {
                ServiceError::UpstreamApi { status, message }
            }
            PianoError::Storage(msg) | PianoError::Internal(msg) => {
                ServiceError::Internal(msg)
            }
        }
    }
}

/// Decrypt-then-fetch: run one aggregated-variations query for `user_id`.
///
/// Precondition failures (`ConfigMissing`, `MissingParams`) are checked
/// before any cryptography and never reach the network. An empty reduced
/// result is a normal outcome, returned as `success: false` with a "no
/// data" message and an empty list — not an error.
pub async fn fetch_aggregated_variations(
    store: &dyn MetaStore,
    keys: &MasterKeyStore,
    piano: &PianoClient,
    user_id: &str,
    req: &PianoProxyRequest,
) -> Result<PianoProxyResponse, PianoError> {
    let encrypted_api_key = store.get(user_id, PIANO_API_KEY_META).await?;
    let site_id_text = store.get(user_id, PIANO_SITE_ID_META).await?;
    let (Some(encrypted_api_key), Some(site_id_text)) = (encrypted_api_key, site_id_text)
    else {
        return Err(PianoError::ConfigMissing);
    };
    if encrypted_api_key.is_empty() || site_id_text.is_empty() {
        return Err(PianoError::ConfigMissing);
    }

    let test_id = required_param(req.test_id.as_deref(), "test_id")?;
    let start_date = required_param(req.start_date.as_deref(), "start_date")?;
    let end_date = required_param(req.end_date.as_deref(), "end_date")?;

    let site_id: i64 = site_id_text
        .trim()
        .parse()
        .map_err(|_| PianoError::InvalidSiteId)?;

    let key = keys.key_bytes().ok_or(PianoError::KeyUnavailable)?;
    let api_key_bytes = cipher::decrypt(&encrypted_api_key, key.as_slice())
        .map_err(|e| PianoError::Decryption(e.to_string()))?;
    let api_key = String::from_utf8(api_key_bytes)
        .map_err(|_| PianoError::Decryption("decrypted credential is not UTF-8".into()))?;

    let data_query = DataQuery::for_test(test_id, site_id, start_date, end_date);
    let response = piano.get_data(&api_key, &data_query).await?;
    let variations = reduce::reduce_variations(&response);

    debug!(
        user_id,
        variations = variations.len(),
        "Piano proxy fetch completed"
    );

    if variations.is_empty() {
        return Ok(PianoProxyResponse {
            success: false,
            message: "No variation data found for this test and period in Piano. \
                      Check the filters and data availability."
                .into(),
            data: Vec::new(),
        });
    }

    Ok(PianoProxyResponse {
        success: true,
        message: "Data retrieved successfully.".into(),
        data: variations,
    })
}

fn required_param<'a>(
    value: Option<&'a str>,
    name: &'static str,
) -> Result<&'a str, PianoError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PianoError::MissingParams(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;
    use crate::store::MemoryStore;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use httpmock::MockServer;
    use std::time::Duration;

    const USER: &str = "user-1";

    fn keyed_store() -> MasterKeyStore {
        MasterKeyStore::new(Some(STANDARD.encode([0x42u8; KEY_LEN])), false)
    }

    fn proxy_request() -> PianoProxyRequest {
        PianoProxyRequest {
            test_id: Some("T1".into()),
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-01-31".into()),
        }
    }

    async fn seed_credential(store: &MemoryStore, keys: &MasterKeyStore, api_key: &str) {
        let blob =
            cipher::encrypt(api_key.as_bytes(), keys.key_bytes().unwrap().as_slice()).unwrap();
        store.set(USER, PIANO_API_KEY_META, &blob).await.unwrap();
        store.set(USER, PIANO_SITE_ID_META, "618272").await.unwrap();
    }

    fn client_for(server: &MockServer) -> PianoClient {
        PianoClient::new(server.url("/getData"), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_outbound_call() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(200).body("{}");
            })
            .await;

        let store = MemoryStore::new();
        let err = fetch_aggregated_variations(
            &store,
            &keyed_store(),
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PianoError::ConfigMissing));
        assert_eq!(
            ServiceError::from(err).code(),
            "piano_config_missing"
        );
        upstream.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn missing_params_rejected() {
        let server = MockServer::start_async().await;
        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "pk").await;

        for req in [
            PianoProxyRequest {
                test_id: None,
                ..proxy_request()
            },
            PianoProxyRequest {
                start_date: Some("  ".into()),
                ..proxy_request()
            },
            PianoProxyRequest {
                end_date: Some(String::new()),
                ..proxy_request()
            },
        ] {
            let err = fetch_aggregated_variations(
                &store,
                &keys,
                &client_for(&server),
                USER,
                &req,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, PianoError::MissingParams(_)), "{req:?}");
        }
    }

    #[tokio::test]
    async fn decrypts_and_fetches_deduplicated_variations() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).header("X-API-Key", "real-piano-key");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        r#"{"DataFeed":[{"Rows":[
                            {"mv_creation":"A","m_unique_visitors":10,"m_conv1_visitors":1},
                            {"mv_creation":"B","m_unique_visitors":5,"m_conv1_visitors":0},
                            {"mv_creation":"A","m_unique_visitors":999,"m_conv1_visitors":9}
                        ]}]}"#,
                    );
            })
            .await;

        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "real-piano-key").await;

        let resp = fetch_aggregated_variations(
            &store,
            &keys,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap();

        upstream.assert_async().await;
        assert!(resp.success);
        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data[0].mv_creation, "A");
        assert_eq!(resp.data[0].visitors, 10);
        assert_eq!(resp.data[1].mv_creation, "B");
    }

    #[tokio::test]
    async fn empty_rows_is_a_no_data_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"DataFeed":[{"Rows":[]}]}"#);
            })
            .await;

        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "pk").await;

        let resp = fetch_aggregated_variations(
            &store,
            &keys,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap();

        assert!(!resp.success);
        assert!(resp.data.is_empty());
        assert!(resp.message.contains("No variation data"));
    }

    #[tokio::test]
    async fn key_mismatch_surfaces_as_decryption_error() {
        let server = MockServer::start_async().await;
        let store = MemoryStore::new();

        // Encrypt under one key, decrypt under another: simulates a master
        // key rotated without re-encrypting stored secrets.
        let old_keys = keyed_store();
        seed_credential(&store, &old_keys, "pk").await;
        let new_keys = MasterKeyStore::new(Some(STANDARD.encode([0x24u8; KEY_LEN])), false);

        let err = fetch_aggregated_variations(
            &store,
            &new_keys,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PianoError::Decryption(_)));
        assert_eq!(ServiceError::from(err).code(), "decryption_failed");
    }

    #[tokio::test]
    async fn absent_master_key_is_a_configuration_error() {
        let server = MockServer::start_async().await;
        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "pk").await;

        let degraded = MasterKeyStore::new(None, false);
        let err = fetch_aggregated_variations(
            &store,
            &degraded,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PianoError::KeyUnavailable));
        let svc: ServiceError = err.into();
        assert_eq!(svc.http_status(), 500);
    }

    #[tokio::test]
    async fn non_numeric_site_id_rejected() {
        let server = MockServer::start_async().await;
        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "pk").await;
        store
            .set(USER, PIANO_SITE_ID_META, "not-a-number")
            .await
            .unwrap();

        let err = fetch_aggregated_variations(
            &store,
            &keys,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PianoError::InvalidSiteId));
    }

    #[tokio::test]
    async fn upstream_4xx_propagates_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET);
                then.status(403)
                    .header("content-type", "application/json")
                    .body(r#"{"message":"forbidden"}"#);
            })
            .await;

        let store = MemoryStore::new();
        let keys = keyed_store();
        seed_credential(&store, &keys, "pk").await;

        let err = fetch_aggregated_variations(
            &store,
            &keys,
            &client_for(&server),
            USER,
            &proxy_request(),
        )
        .await
        .unwrap_err();

        let svc: ServiceError = err.into();
        assert_eq!(svc.http_status(), 403);
        assert_eq!(svc.code(), "piano_api_error");
    }
}
