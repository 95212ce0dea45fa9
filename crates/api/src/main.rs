//! `abtool-api` — A/B tool backend binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the tracing pipeline.
//! 3. Build the [`MasterKeyStore`] and resolve the key once, logging any
//!    degraded state up front.
//! 4. Wire the storage and entitlement collaborators.
//! 5. Build the Axum router and start the HTTP server.

mod config;
mod crypto;
mod entitlement;
mod key;
mod piano;
mod server;
mod store;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::Config;
use entitlement::StaticEntitlements;
use key::MasterKeyStore;
use piano::PianoClient;
use server::state::AppState;
use store::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        http_port = cfg.http_port,
        "abtool-api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Master key
    // -----------------------------------------------------------------------
    let keys = MasterKeyStore::new(cfg.encryption_key.clone(), cfg.allow_insecure_dev_key);
    // Resolve eagerly so a degraded key state is visible at startup, not on
    // the first credential operation.
    if !keys.is_ready() {
        warn!(
            insecure_dev_key = keys.is_insecure(),
            "starting in degraded mode: no valid ENCRYPTION_KEY"
        );
    }

    // -----------------------------------------------------------------------
    // 4. Collaborators
    // -----------------------------------------------------------------------
    let meta_store = Arc::new(MemoryStore::new());
    let entitlements = cfg
        .entitled_user_ids
        .as_deref()
        .map(|csv| Arc::new(StaticEntitlements::from_csv(csv)) as Arc<dyn entitlement::Entitlements>);
    if entitlements.is_none() {
        warn!("no entitlement backend configured; check-access will fail closed");
    }

    let piano = PianoClient::new(
        cfg.piano_base_url.clone(),
        Duration::from_secs(cfg.piano_timeout_secs),
    )
    .context("failed to build the Piano HTTP client")?;

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(keys, meta_store, entitlements, piano);
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.http_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
