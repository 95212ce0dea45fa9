//! Entitlement collaborator: does this user have an active subscription?
//!
//! The membership system is external; the core only needs a boolean answer.
//! A *missing* collaborator is a deployment error that fails closed with a
//! 500, whereas a `false` answer is a normal end-user state reported with
//! HTTP 200.

use std::collections::HashSet;

use async_trait::async_trait;

/// Boolean access right derived from an external subscription system.
#[async_trait]
pub trait Entitlements: Send + Sync {
    /// `true` when `user_id` currently holds an active entitlement.
    async fn has_active_entitlement(&self, user_id: &str) -> bool;
}

/// Fixed allowlist backend, seeded from configuration.
///
/// Stands in for the real membership integration in single-process
/// deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEntitlements {
    entitled: HashSet<String>,
}

impl StaticEntitlements {
    /// Build from a comma-separated list of user ids.
    pub fn from_csv(csv: &str) -> Self {
        let entitled = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { entitled }
    }
}

#[async_trait]
impl Entitlements for StaticEntitlements {
    async fn has_active_entitlement(&self, user_id: &str) -> bool {
        self.entitled.contains(user_id)
    }
}
