//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Unauthorized`] → 401
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Encryption`] / [`ServiceError::Decryption`] → 500
/// - [`ServiceError::Configuration`] / [`ServiceError::Internal`] → 500
/// - [`ServiceError::UpstreamUnreachable`] → 502
/// - [`ServiceError::UpstreamApi`] → the upstream status, verbatim
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed — missing parameter, non-numeric site id,
    /// or unconfigured credential. Carries a machine-readable code so the
    /// frontend can distinguish "save your Piano config first" from plain
    /// validation failures.
    #[error("bad request ({code}): {message}")]
    BadRequest { code: &'static str, message: String },

    /// No authenticated identity accompanied the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server-side master key is absent or invalid; encryption and
    /// decryption are hard no-ops until it is fixed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Encrypting the caller's credential failed at the cipher layer.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decrypting the stored credential failed — most often the master key
    /// no longer matches what encrypted the stored value. The caller should
    /// re-save their credential.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Transport-level failure reaching the remote analytics API (timeout,
    /// DNS, TLS, connection refused).
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The remote analytics API answered with a 4xx/5xx or an unparsable
    /// body. `message` is already truncated; never the raw upstream body.
    #[error("upstream API error ({status}): {message}")]
    UpstreamApi { status: u16, message: String },

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest { .. } => 400,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::NotFound(_) => 404,
            ServiceError::Configuration(_) => 500,
            ServiceError::Encryption(_) => 500,
            ServiceError::Decryption(_) => 500,
            ServiceError::UpstreamUnreachable(_) => 502,
            ServiceError::UpstreamApi { status, .. } => *status,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code included in every error response body.
    pub fn code(&self) -> &str {
        match self {
            ServiceError::BadRequest { code, .. } => code,
            ServiceError::Unauthorized(_) => "not_logged_in",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Configuration(_) => "encryption_unavailable",
            ServiceError::Encryption(_) => "encryption_failed",
            ServiceError::Decryption(_) => "decryption_failed",
            ServiceError::UpstreamUnreachable(_) => "piano_request_failed",
            ServiceError::UpstreamApi { .. } => "piano_api_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        let missing = ServiceError::BadRequest {
            code: "missing_params",
            message: "x".into(),
        };
        assert_eq!(missing.http_status(), 400);
        assert_eq!(ServiceError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(ServiceError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ServiceError::Encryption("x".into()).http_status(), 500);
        assert_eq!(ServiceError::Decryption("x".into()).http_status(), 500);
        assert_eq!(
            ServiceError::UpstreamUnreachable("x".into()).http_status(),
            502
        );
    }

    #[test]
    fn upstream_api_error_propagates_status() {
        let e = ServiceError::UpstreamApi {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(e.http_status(), 403);
        assert_eq!(e.code(), "piano_api_error");
        assert!(e.to_string().contains("forbidden"));
    }

    #[test]
    fn bad_request_keeps_specific_code() {
        let e = ServiceError::BadRequest {
            code: "piano_config_missing",
            message: "save your Piano config first".into(),
        };
        assert_eq!(e.code(), "piano_config_missing");
        assert_eq!(e.http_status(), 400);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::Decryption("check the server encryption key".into());
        assert!(e.to_string().contains("check the server encryption key"));
    }
}
