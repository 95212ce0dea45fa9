//! Axum request handlers for all service endpoints.
//!
//! Identity comes from the `X-User-Id` header, placed by the upstream
//! session/auth layer; requests without it are rejected with 401. All
//! failures are converted to typed [`ServiceError`] outcomes at this
//! boundary — nothing below it builds HTTP responses.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    CheckAccessResponse, ErrorResponse, HealthResponse, PianoConfigResponse, PianoProxyRequest,
    SavePianoConfigRequest, SavedResponse,
};
use common::ServiceError;
use serde_json::Value;
use tracing::warn;

use super::state::AppState;
use crate::crypto::cipher;
use crate::piano;
use crate::store::{
    experiment_meta_key, EXPERIMENT_PREFIX, PIANO_API_KEY_META, PIANO_SITE_ID_META,
};

/// Header carrying the authenticated user id, set by the upstream auth layer.
const USER_ID_HEADER: &str = "X-User-Id";

/// Convert a [`ServiceError`] into its HTTP response.
fn error_response(err: &ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.code(), err.to_string()))).into_response()
}

/// Extract the authenticated user id, or build the 401 response.
fn require_user(headers: &HeaderMap) -> Result<String, Response> {
    match headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_owned()),
        _ => Err(error_response(&ServiceError::Unauthorized(
            "you must be logged in to perform this action".into(),
        ))),
    }
}

/// `GET /health` — liveness and degraded-mode reporting.
///
/// Returns `200 OK` when a real master key is loaded, `503` otherwise
/// (absent key, or the insecure development placeholder).
pub async fn health(State(state): State<AppState>) -> Response {
    let master_key_ready = state.keys.is_ready();
    let insecure_dev_key = state.keys.is_insecure();

    let (status_code, status_str) = if master_key_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        master_key_ready,
        insecure_dev_key,
    };
    (status_code, Json(body)).into_response()
}

/// `GET /api/v1/check-access` — does this user hold an active entitlement?
///
/// A missing entitlement backend is a deployment error (500). A user simply
/// lacking the entitlement is a normal 200 with `has_access: false`, so the
/// frontend can show the message.
pub async fn check_access(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let Some(entitlements) = state.entitlements.as_ref() else {
        warn!("entitlement backend not configured; failing check-access closed");
        let err = ErrorResponse::new(
            "entitlement_config_error",
            "configuration error: subscription backend not available",
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response();
    };

    let body = if entitlements.has_active_entitlement(&user_id).await {
        CheckAccessResponse {
            has_access: true,
            message: "Access granted.".into(),
        }
    } else {
        CheckAccessResponse {
            has_access: false,
            message: "An active subscription is required to use this tool.".into(),
        }
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// `POST /api/v1/piano-config` — encrypt and store the user's credential.
pub async fn save_piano_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SavePianoConfigRequest>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let api_key = req.api_key.trim();
    let site_id = req.site_id.trim();
    if api_key.is_empty() || site_id.is_empty() {
        return error_response(&ServiceError::BadRequest {
            code: "missing_params",
            message: "API key and site id are required".into(),
        });
    }
    if !site_id.bytes().all(|b| b.is_ascii_digit()) {
        return error_response(&ServiceError::BadRequest {
            code: "invalid_site_id",
            message: "the Piano site id must be numeric".into(),
        });
    }

    let Some(key) = state.keys.key_bytes() else {
        return error_response(&ServiceError::Configuration(
            "server encryption key is not configured; cannot store credentials".into(),
        ));
    };
    let blob = match cipher::encrypt(api_key.as_bytes(), key.as_slice()) {
        Ok(blob) => blob,
        Err(e) => {
            warn!(error = %e, "credential encryption failed");
            return error_response(&ServiceError::Encryption(
                "failed to encrypt the API key".into(),
            ));
        }
    };

    // Both fields are set together; a partial credential is never stored.
    let writes = async {
        state.store.set(&user_id, PIANO_API_KEY_META, &blob).await?;
        state.store.set(&user_id, PIANO_SITE_ID_META, site_id).await
    };
    if let Err(e) = writes.await {
        return error_response(&ServiceError::Internal(e.to_string()));
    }

    (
        StatusCode::OK,
        Json(SavedResponse::ok("Piano configuration saved.")),
    )
        .into_response()
}

/// `GET /api/v1/piano-config` — the stored config shape, never the key.
pub async fn get_piano_config(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let site_id = match state.store.get(&user_id, PIANO_SITE_ID_META).await {
        Ok(v) => v.filter(|s| !s.is_empty()),
        Err(e) => return error_response(&ServiceError::Internal(e.to_string())),
    };
    let api_key_set = match state.store.get(&user_id, PIANO_API_KEY_META).await {
        Ok(v) => v.is_some_and(|s| !s.is_empty()),
        Err(e) => return error_response(&ServiceError::Internal(e.to_string())),
    };

    let body = PianoConfigResponse {
        success: true,
        site_id,
        api_key_set,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /api/v1/experiments` — all stored experiment-state documents.
///
/// Values that fail to parse, or that lack a `name`, are skipped rather than
/// failing the whole listing.
pub async fn list_experiments(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let entries = match state.store.list_by_prefix(&user_id, EXPERIMENT_PREFIX).await {
        Ok(entries) => entries,
        Err(e) => return error_response(&ServiceError::Internal(e.to_string())),
    };

    let experiments: Vec<Value> = entries
        .iter()
        .filter_map(|(_, raw)| serde_json::from_str::<Value>(raw).ok())
        .filter(|v| {
            v.as_object()
                .and_then(|o| o.get("name"))
                .and_then(Value::as_str)
                .is_some_and(|n| !n.is_empty())
        })
        .collect();

    (StatusCode::OK, Json(experiments)).into_response()
}

/// `POST /api/v1/experiments` — save one experiment-state document.
pub async fn save_experiment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let name = body
        .as_object()
        .and_then(|o| o.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let Some(name) = name else {
        return error_response(&ServiceError::BadRequest {
            code: "missing_data",
            message: "experiment data with a non-empty name is required".into(),
        });
    };

    let meta_key = experiment_meta_key(name);
    if meta_key == EXPERIMENT_PREFIX {
        // The name reduced to an empty slug — nothing addressable to store.
        return error_response(&ServiceError::BadRequest {
            code: "missing_data",
            message: "experiment name contains no usable characters".into(),
        });
    }

    let serialized = body.to_string();
    if let Err(e) = state.store.set(&user_id, &meta_key, &serialized).await {
        return error_response(&ServiceError::Internal(e.to_string()));
    }

    (StatusCode::OK, Json(SavedResponse::ok("Experiment saved."))).into_response()
}

/// `DELETE /api/v1/experiments/:slug` — remove one experiment by slug.
pub async fn delete_experiment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let valid_slug = !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid_slug {
        return error_response(&ServiceError::BadRequest {
            code: "invalid_slug",
            message: "experiment slug may only contain letters, digits, '-' and '_'".into(),
        });
    }

    let meta_key = format!("{EXPERIMENT_PREFIX}{slug}");
    match state.store.delete(&user_id, &meta_key).await {
        Ok(true) => {
            (StatusCode::OK, Json(SavedResponse::ok("Experiment deleted."))).into_response()
        }
        Ok(false) => error_response(&ServiceError::NotFound(
            "experiment not found or already deleted".into(),
        )),
        Err(e) => error_response(&ServiceError::Internal(e.to_string())),
    }
}

/// `POST /api/v1/piano-data-proxy` — decrypt-then-fetch aggregated variations.
pub async fn piano_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PianoProxyRequest>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match piano::fetch_aggregated_variations(
        state.store.as_ref(),
        &state.keys,
        &state.piano,
        &user_id,
        &req,
    )
    .await
    {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(&ServiceError::from(e)),
    }
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
