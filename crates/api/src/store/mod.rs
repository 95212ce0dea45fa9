//! Per-user key-value storage collaborator.
//!
//! The service persists three kinds of values per user: the encrypted Piano
//! API key blob, the plaintext numeric site id, and named experiment-state
//! JSON documents under a common prefix. The storage engine itself is an
//! external concern, abstracted behind [`MetaStore`] so the core stays free
//! of database specifics; [`MemoryStore`] is the in-process backend used by
//! the binary and tests.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Meta key holding the encrypted Piano API key blob.
pub const PIANO_API_KEY_META: &str = "piano_api_key_v2";

/// Meta key holding the plaintext numeric Piano site id.
pub const PIANO_SITE_ID_META: &str = "piano_site_id_v2";

/// Prefix under which experiment-state documents are stored, one per slug.
pub const EXPERIMENT_PREFIX: &str = "exp_";

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to read or write a value.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Generic per-user key-value store: opaque string values by user + key.
///
/// Implementations must be `Send + Sync` so they can be shared across async
/// tasks behind an `Arc<dyn MetaStore>`.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Fetch the value stored under `key` for `user_id`, if any.
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Store (or replace) `value` under `key` for `user_id`.
    async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value under `key`. Returns `true` if something was deleted.
    async fn delete(&self, user_id: &str, key: &str) -> Result<bool, StoreError>;

    /// All `(key, value)` pairs for `user_id` whose key starts with `prefix`.
    async fn list_by_prefix(
        &self,
        user_id: &str,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, StoreError>;
}

/// Reduce an experiment name to the slug used in its meta key: lowercase
/// ASCII alphanumerics, `-` and `_`, with every other run of characters
/// collapsed to a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Meta key for the experiment named `name`.
pub fn experiment_meta_key(name: &str) -> String {
    format!("{EXPERIMENT_PREFIX}{}", slugify(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("My First Test"), "my-first-test");
        assert_eq!(slugify("  Homepage CTA v2  "), "homepage-cta-v2");
    }

    #[test]
    fn slugify_keeps_hyphen_and_underscore() {
        assert_eq!(slugify("promo_test-2024"), "promo_test-2024");
    }

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("a / b / c"), "a-b-c");
        assert_eq!(slugify("été!!test"), "t-test");
    }

    #[test]
    fn experiment_meta_key_applies_prefix() {
        assert_eq!(experiment_meta_key("My Test"), "exp_my-test");
    }
}
