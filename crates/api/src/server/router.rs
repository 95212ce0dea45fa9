//! Axum router construction.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/check-access", get(handlers::check_access))
        .route(
            "/api/v1/piano-config",
            get(handlers::get_piano_config).post(handlers::save_piano_config),
        )
        .route(
            "/api/v1/experiments",
            get(handlers::list_experiments).post(handlers::save_experiment),
        )
        .route(
            "/api/v1/experiments/:slug",
            delete(handlers::delete_experiment),
        )
        .route("/api/v1/piano-data-proxy", post(handlers::piano_proxy))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
