//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::entitlement::Entitlements;
use crate::key::MasterKeyStore;
use crate::piano::PianoClient;
use crate::store::MetaStore;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or internally `Arc`-backed)
/// so that Axum can clone the state per request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide memoized master key.
    pub keys: MasterKeyStore,
    /// Per-user key-value storage collaborator.
    pub store: Arc<dyn MetaStore>,
    /// Entitlement collaborator. `None` means the backend is not configured;
    /// access checks then fail closed with a 500.
    pub entitlements: Option<Arc<dyn Entitlements>>,
    /// Outbound Piano Analytics client.
    pub piano: PianoClient,
}

impl AppState {
    /// Create a new [`AppState`] from its collaborators.
    pub fn new(
        keys: MasterKeyStore,
        store: Arc<dyn MetaStore>,
        entitlements: Option<Arc<dyn Entitlements>>,
        piano: PianoClient,
    ) -> Self {
        Self {
            keys,
            store,
            entitlements,
            piano,
        }
    }

    /// State with no master key, an empty in-memory store, and no
    /// entitlement backend — the degraded baseline the handler tests build on.
    #[cfg(test)]
    pub(crate) fn test_state() -> Self {
        use std::time::Duration;

        Self::new(
            MasterKeyStore::new(None, false),
            Arc::new(crate::store::MemoryStore::new()),
            None,
            PianoClient::new("http://127.0.0.1:9/getData", Duration::from_secs(1))
                .expect("reqwest client"),
        )
    }
}
