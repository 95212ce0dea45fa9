//! HTTP server: router, handlers, shared state, and middleware constants.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
