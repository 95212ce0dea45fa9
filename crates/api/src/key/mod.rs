//! Master key loading, validation, and process-wide memoization.
//!
//! # Lifecycle
//!
//! 1. `ENCRYPTION_KEY` (base64 of exactly 32 bytes) is captured into
//!    [`MasterKeyStore`] at startup, undecoded.
//! 2. The first caller of [`MasterKeyStore::current`] decodes and validates
//!    it; the resulting [`KeyState`] is written once and cached for the
//!    process lifetime. Concurrent first callers cannot race to produce
//!    inconsistent cached values.
//! 3. An absent or malformed key yields [`KeyState::Absent`]: the service
//!    keeps running, but every encrypt/decrypt is a hard failure. With the
//!    `ALLOW_INSECURE_DEV_KEY` escape hatch set, a fixed placeholder key is
//!    substituted instead so the rest of the system stays exercisable in
//!    development.
//!
//! # Security invariants
//!
//! - The plaintext master key is **never** written to disk, logged, or
//!   included in traces; `Debug` output is redacted.
//! - Every handout of the insecure placeholder key is logged at ERROR level.

pub mod store;

pub use store::{KeyState, MasterKeyBytes, MasterKeyStore};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::error;

use crate::crypto::KEY_LEN;

/// Fixed pattern behind the development placeholder key, zero-padded to
/// [`KEY_LEN`] bytes. Deliberately eye-catching in any dump.
const INSECURE_DEV_KEY_PATTERN: &[u8] = b"!!INSECURE_DEV_KEY_32_BYTES!!";

/// The 32-byte insecure placeholder key used only under
/// `ALLOW_INSECURE_DEV_KEY`.
pub(crate) fn insecure_dev_key() -> MasterKeyBytes {
    let mut buf = Box::new([0u8; KEY_LEN]);
    buf[..INSECURE_DEV_KEY_PATTERN.len()].copy_from_slice(INSECURE_DEV_KEY_PATTERN);
    MasterKeyBytes(buf)
}

/// Decode and validate the configured master key into a [`KeyState`].
///
/// Any invalid base64 or a decoded length other than [`KEY_LEN`] is treated
/// identically to an absent key.
pub(crate) fn resolve(configured: Option<&str>, allow_insecure_dev_key: bool) -> KeyState {
    let decoded = configured
        .filter(|s| !s.trim().is_empty())
        .and_then(|b64| match STANDARD.decode(b64.trim()) {
            Ok(bytes) if bytes.len() == KEY_LEN => Some(bytes),
            Ok(bytes) => {
                error!(
                    decoded_len = bytes.len(),
                    "ENCRYPTION_KEY does not decode to exactly {KEY_LEN} bytes; treating as absent"
                );
                None
            }
            Err(_) => {
                error!("ENCRYPTION_KEY is not valid base64; treating as absent");
                None
            }
        });

    match decoded {
        Some(bytes) => {
            let mut buf = Box::new([0u8; KEY_LEN]);
            buf.copy_from_slice(&bytes);
            KeyState::Loaded(MasterKeyBytes(buf))
        }
        None if allow_insecure_dev_key => {
            error!(
                "ENCRYPTION_KEY absent or invalid — substituting the INSECURE development \
                 placeholder key; never run production traffic in this state"
            );
            KeyState::Insecure(insecure_dev_key())
        }
        None => {
            error!(
                "ENCRYPTION_KEY absent or invalid; credential encryption and decryption \
                 will fail until it is configured"
            );
            KeyState::Absent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64_key(byte: u8) -> String {
        STANDARD.encode([byte; KEY_LEN])
    }

    #[test]
    fn valid_key_loads() {
        let state = resolve(Some(&b64_key(0x42)), false);
        match state {
            KeyState::Loaded(k) => assert_eq!(&k.0[..], &[0x42u8; KEY_LEN]),
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn absent_key_is_absent_outside_dev_mode() {
        assert!(matches!(resolve(None, false), KeyState::Absent));
        assert!(matches!(resolve(Some(""), false), KeyState::Absent));
        assert!(matches!(resolve(Some("   "), false), KeyState::Absent));
    }

    #[test]
    fn invalid_base64_treated_as_absent() {
        assert!(matches!(resolve(Some("@@not-base64@@"), false), KeyState::Absent));
    }

    #[test]
    fn wrong_length_treated_as_absent() {
        let short = STANDARD.encode([0u8; 16]);
        assert!(matches!(resolve(Some(&short), false), KeyState::Absent));
        let long = STANDARD.encode([0u8; 48]);
        assert!(matches!(resolve(Some(&long), false), KeyState::Absent));
    }

    #[test]
    fn dev_mode_substitutes_placeholder() {
        let state = resolve(None, true);
        match state {
            KeyState::Insecure(k) => {
                assert_eq!(k.0.len(), KEY_LEN);
                assert!(k.0.starts_with(b"!!INSECURE_DEV_KEY"));
            }
            other => panic!("expected Insecure, got {other:?}"),
        }
    }

    #[test]
    fn dev_mode_never_overrides_a_valid_key() {
        let state = resolve(Some(&b64_key(0x01)), true);
        assert!(matches!(state, KeyState::Loaded(_)));
    }

    #[test]
    fn placeholder_is_exactly_key_len() {
        assert_eq!(insecure_dev_key().0.len(), KEY_LEN);
    }
}
