//! [`MasterKeyStore`]: single-assignment, process-wide cache of the master key.

use std::sync::{Arc, OnceLock};

use tracing::error;

use crate::crypto::KEY_LEN;

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Cloned into handler call stacks when needed. When this type is dropped,
/// the memory is overwritten with zeroes to minimise the window during which
/// plaintext key material lives in RAM.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKeyBytes(pub Box<[u8; KEY_LEN]>);

impl Drop for MasterKeyBytes {
    fn drop(&mut self) {
        // Zero the key material on drop.
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for MasterKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("MasterKeyBytes([REDACTED])")
    }
}

impl MasterKeyBytes {
    /// Borrow the raw key bytes for cipher calls.
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }
}

/// Outcome of resolving the configured master key, cached per process.
#[derive(Debug, Clone)]
pub enum KeyState {
    /// A valid 32-byte key decoded from `ENCRYPTION_KEY`.
    Loaded(MasterKeyBytes),
    /// The fixed development placeholder, substituted because the real key
    /// was absent or invalid and `ALLOW_INSECURE_DEV_KEY` was set.
    Insecure(MasterKeyBytes),
    /// No usable key. Every encrypt/decrypt fails until the configuration
    /// is fixed.
    Absent,
}

/// Lazily-initialised, single-assignment holder for the master key.
///
/// Wraps an `Arc<OnceLock<KeyState>>`: the configured base64 string is
/// decoded at most once per process, on first use, and concurrent first
/// callers all observe the same cached [`KeyState`]. There is no rotation —
/// the key is immutable for the process lifetime.
#[derive(Clone)]
pub struct MasterKeyStore {
    configured: Option<String>,
    allow_insecure_dev_key: bool,
    cell: Arc<OnceLock<KeyState>>,
}

impl std::fmt::Debug for MasterKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `configured` is the (encoded) master key — never print it.
        f.debug_struct("MasterKeyStore")
            .field("configured", &self.configured.as_ref().map(|_| "[REDACTED]"))
            .field("allow_insecure_dev_key", &self.allow_insecure_dev_key)
            .field("resolved", &self.cell.get().is_some())
            .finish()
    }
}

impl MasterKeyStore {
    /// Create a store over the configured (still-encoded) key material.
    ///
    /// Nothing is decoded until the first [`current`](Self::current) call.
    pub fn new(configured: Option<String>, allow_insecure_dev_key: bool) -> Self {
        Self {
            configured,
            allow_insecure_dev_key,
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// The memoized [`KeyState`], resolving the configuration on first call.
    pub fn current(&self) -> &KeyState {
        self.cell.get_or_init(|| {
            super::resolve(self.configured.as_deref(), self.allow_insecure_dev_key)
        })
    }

    /// Borrow a clone of the usable key bytes, if any.
    ///
    /// Returns `None` in the [`KeyState::Absent`] degraded mode. Handing out
    /// the insecure placeholder is logged at ERROR level on every call so it
    /// cannot pass unnoticed in any environment.
    pub fn key_bytes(&self) -> Option<MasterKeyBytes> {
        match self.current() {
            KeyState::Loaded(k) => Some(k.clone()),
            KeyState::Insecure(k) => {
                error!("using the INSECURE development placeholder master key");
                Some(k.clone())
            }
            KeyState::Absent => None,
        }
    }

    /// `true` when a real (non-placeholder) key is loaded.
    pub fn is_ready(&self) -> bool {
        matches!(self.current(), KeyState::Loaded(_))
    }

    /// `true` when the insecure development placeholder is in use.
    pub fn is_insecure(&self) -> bool {
        matches!(self.current(), KeyState::Insecure(_))
    }
}
