//! Request and response types exchanged between the frontend and the service.
//!
//! These types are serialised as JSON over the public REST API. Field names
//! match the wire format the frontend already consumes (`mv_creation`,
//! `api_key_set`, ...), so renames here are breaking changes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Piano credential configuration
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/piano-config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePianoConfigRequest {
    /// Raw Piano Analytics API key. Encrypted before it touches storage;
    /// never echoed back to the caller.
    pub api_key: String,
    /// Numeric Piano site identifier, as entered by the user.
    pub site_id: String,
}

/// Response body for `GET /api/v1/piano-config`.
///
/// Deliberately never contains the API key itself — only whether one is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PianoConfigResponse {
    pub success: bool,
    pub site_id: Option<String>,
    pub api_key_set: bool,
}

// ---------------------------------------------------------------------------
// Analytics proxy
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/piano-data-proxy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PianoProxyRequest {
    /// Test identifier to filter on (equality match upstream).
    pub test_id: Option<String>,
    /// Inclusive start of the daily-granularity period, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive end of the period, `YYYY-MM-DD`.
    pub end_date: Option<String>,
}

/// One deduplicated variation row returned by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationStats {
    /// Creation (variation) identifier as reported by Piano.
    pub mv_creation: String,
    /// Unique visitor count, non-negative.
    pub visitors: u64,
    /// First-goal conversion count, non-negative.
    pub conversions: u64,
}

/// Response body for `POST /api/v1/piano-data-proxy`.
///
/// `success: false` with an empty `data` list and HTTP 200 means "the query
/// ran but matched nothing" — an expected outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PianoProxyResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<VariationStats>,
}

// ---------------------------------------------------------------------------
// Access check
// ---------------------------------------------------------------------------

/// Response body for `GET /api/v1/check-access`.
///
/// A missing entitlement is reported with HTTP 200 so the frontend can show
/// `message` to the user; only a misconfigured backend yields a 5xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAccessResponse {
    pub has_access: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Generic outcomes
// ---------------------------------------------------------------------------

/// Body returned by mutating endpoints on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedResponse {
    pub success: bool,
    pub message: String,
}

impl SavedResponse {
    /// Construct a `success: true` response with the given message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"piano_config_missing"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether a real master key is loaded. `false` means every credential
    /// operation will fail until `ENCRYPTION_KEY` is fixed.
    pub master_key_ready: bool,
    /// Whether the insecure development placeholder key is in use.
    pub insecure_dev_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_request_tolerates_missing_fields() {
        let req: PianoProxyRequest = serde_json::from_str(r#"{"test_id":"T1"}"#).unwrap();
        assert_eq!(req.test_id.as_deref(), Some("T1"));
        assert!(req.start_date.is_none());
        assert!(req.end_date.is_none());
    }

    #[test]
    fn variation_stats_wire_names() {
        let v = VariationStats {
            mv_creation: "A".into(),
            visitors: 10,
            conversions: 2,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["mv_creation"], "A");
        assert_eq!(json["visitors"], 10);
        assert_eq!(json["conversions"], 2);
    }

    #[test]
    fn config_response_never_carries_key_material() {
        let resp = PianoConfigResponse {
            success: true,
            site_id: Some("618272".into()),
            api_key_set: true,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("api_key\":"));
        assert!(json.contains("api_key_set"));
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("missing_proxy_params", "test_id is required");
        assert_eq!(e.code, "missing_proxy_params");
        assert!(e.message.contains("test_id"));
    }

    #[test]
    fn health_response_serde() {
        let h = HealthResponse {
            status: "ok".into(),
            master_key_ready: true,
            insecure_dev_key: false,
        };
        let json = serde_json::to_string(&h).unwrap();
        let decoded: HealthResponse = serde_json::from_str(&json).unwrap();
        assert!(decoded.master_key_ready);
        assert!(!decoded.insecure_dev_key);
    }
}
