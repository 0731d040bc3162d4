//! Fixed `/agentauth/*` routes.
//!
//! The credential endpoint is the only route anywhere that returns a raw
//! secret in a response body. It exists for the git credential helper
//! running on a trusted source IP and is gated solely by the allowlist.

use crate::api::proxy::AppState;
use crate::api::registry;
use crate::core::access_log::{self, AccessLogged};
use crate::core::keystore::KeystoreError;
use crate::core::ProxyError;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Liveness plus a snapshot of the registry, consumed by the swarm
/// launcher to health-gate container startup.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "backends": registry::provider_ids(),
        "port": state.config.port,
    }))
}

/// Registered provider ids.
pub async fn providers() -> impl IntoResponse {
    Json(registry::provider_ids())
}

/// Fetch a stored token for a git credential helper.
///
/// The id namespace is the secret store's, not the provider registry's: a
/// `github` token is fetchable here without `github` being a proxyable
/// provider.
pub async fn credential(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
) -> Response {
    if !is_valid_credential_id(&id) {
        return not_found_response(&id);
    }

    match state.keystore.read(&id).await {
        Ok(secret) => {
            Json(json!({ "token": secret.expose_secret() })).into_response()
        }
        Err(KeystoreError::NotFound(_)) => {
            access_log::error(
                addr.ip(),
                "GET",
                &format!("/agentauth/credential/{id}"),
                &format!("no credential stored for {id}"),
            );
            let mut response = not_found_response(&id);
            response.extensions_mut().insert(AccessLogged);
            response
        }
        Err(KeystoreError::Unavailable(message)) => {
            access_log::error(
                addr.ip(),
                "GET",
                &format!("/agentauth/credential/{id}"),
                &message,
            );
            let mut response = ProxyError::Keystore(message).into_response();
            response.extensions_mut().insert(AccessLogged);
            response
        }
    }
}

fn not_found_response(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "no_credential",
            "message": format!("no credential stored for '{id}'"),
        })),
    )
        .into_response()
}

/// Ids share the secret-store account charset.
fn is_valid_credential_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
