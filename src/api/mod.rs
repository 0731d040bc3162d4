//! HTTP surface: fixed routes, the provider dispatch fallback, and the
//! admission/logging layers that wrap them.

pub mod handlers;
pub mod proxy;
pub mod registry;
pub mod stream;

pub use proxy::AppState;
pub use registry::{AuthStyle, Provider, PROVIDERS};

use crate::core::middleware;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use std::sync::Arc;

/// Build the full router. Admission is the outermost layer so no route,
/// including the fallback, is reachable from outside the allowlist.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agentauth/health", get(handlers::health))
        .route("/agentauth/providers", get(handlers::providers))
        .route("/agentauth/credential/:id", get(handlers::credential))
        .fallback(proxy::dispatch)
        .layer(from_fn(middleware::access_logging))
        .layer(from_fn_with_state(state.clone(), middleware::admission))
        .with_state(state)
}
