//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, and response compression.

use std::time::Duration;

/// Default per-request timeout applied to all routes. Must stay above the
/// 25-second outbound Piano timeout so upstream slowness surfaces as a 502,
/// not a blanket request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
