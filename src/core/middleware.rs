//! Request admission and terminal logging.
//!
//! Admission is the outermost layer: a connection from outside the
//! allowlist is logged as `DENIED` and answered `403` before any route,
//! body, or keystore work happens. The logging layer sits just inside it
//! and writes the generic request line for handlers that did not already
//! produce their own terminal event (the proxy engine logs streamed
//! responses itself, after the body ends).

use crate::api::proxy::AppState;
use crate::core::access_log::{self, AccessLogged};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Gate every request on the source network. Runs before all other work.
pub async fn admission(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let remote = addr.ip();
    if !state.allowlist.is_allowed(remote) {
        access_log::denied(remote, request.method().as_str(), request.uri().path());
        return (StatusCode::FORBIDDEN, "forbidden").into_response();
    }
    next.run(request).await
}

/// Write the request line for responses that have not logged themselves.
pub async fn access_logging(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let remote = addr.ip();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    if response.extensions().get::<AccessLogged>().is_none() {
        access_log::request(
            remote,
            &method,
            &path,
            "-",
            response.status().as_u16(),
            start.elapsed().as_millis(),
        );
    }
    response
}
