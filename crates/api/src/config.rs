//! Configuration loading and validation for the A/B tool backend.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any value is present but invalid. The
//! master key is deliberately *not* validated here: an absent or malformed
//! `ENCRYPTION_KEY` puts the service into a degraded mode (see [`crate::key`])
//! instead of refusing to start.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base64-encoded 32-byte master key used for credential encryption.
    /// Absent or malformed values degrade the service rather than crash it.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Explicit development escape hatch: when the master key is absent or
    /// invalid, substitute a fixed insecure placeholder so the rest of the
    /// system stays exercisable. Must never be enabled in production.
    #[serde(default)]
    pub allow_insecure_dev_key: bool,

    /// Base URL of the Piano Analytics data endpoint.
    #[serde(default = "default_piano_base_url")]
    pub piano_base_url: String,

    /// Outbound request timeout (seconds) for Piano API calls.
    #[serde(default = "default_piano_timeout")]
    pub piano_timeout_secs: u64,

    /// Port the HTTP server listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Comma-separated user ids with an active entitlement. Absent means the
    /// entitlement collaborator is not configured and access checks fail
    /// closed with a 500.
    #[serde(default)]
    pub entitled_user_ids: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_piano_base_url() -> String {
    "https://api.atinternet.io/v3/data/getData".into()
}
fn default_piano_timeout() -> u64 {
    25
}
fn default_http_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any present variable cannot be parsed or fails
    /// validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.piano_base_url.trim().is_empty() {
            anyhow::bail!("PIANO_BASE_URL must not be empty");
        }
        if self.piano_timeout_secs == 0 {
            anyhow::bail!("PIANO_TIMEOUT_SECS must be > 0");
        }
        if self.http_port == 0 {
            anyhow::bail!("HTTP_PORT must be > 0");
        }
        Ok(())
    }
}

impl Default for Config {
    /// Defaults suitable for tests: no key, no entitlements, standard URLs.
    fn default() -> Self {
        Self {
            encryption_key: None,
            allow_insecure_dev_key: false,
            piano_base_url: default_piano_base_url(),
            piano_timeout_secs: default_piano_timeout(),
            http_port: default_http_port(),
            entitled_user_ids: None,
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(
            default_piano_base_url(),
            "https://api.atinternet.io/v3/data/getData"
        );
        assert_eq!(default_piano_timeout(), 25);
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = Config {
            piano_timeout_secs: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let cfg = Config {
            piano_base_url: "  ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_missing_key() {
        // A missing master key degrades the service but is not a startup error.
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.encryption_key.is_none());
    }
}
