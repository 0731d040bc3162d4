//! Error types for the proxy.
//!
//! Every failure on the request path is converted to [`ProxyError`] so the
//! HTTP mapping lives in one place. Bodies are short fixed strings; nothing
//! derived from headers, request bodies, or keystore output is ever echoed
//! back to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures that terminate a request before or during upstream forwarding.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// No route and no registered provider matched the path.
    #[error("not found")]
    NotFound,

    /// The secret store has no entry for the provider.
    #[error("no stored credential for provider {0}")]
    MissingCredential(&'static str),

    /// The secret store could not be reached or timed out.
    #[error("keystore unavailable: {0}")]
    Keystore(String),

    /// Connect, TLS, or read failure talking to the upstream provider.
    #[error("{0}")]
    Upstream(String),

    /// Captured request body exceeded the local ceiling.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Anything else. The message must not contain secret material.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ProxyError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            ProxyError::MissingCredential(_) | ProxyError::Keystore(_) | ProxyError::Upstream(_) => {
                (StatusCode::BAD_GATEWAY, "bad gateway")
            }
            ProxyError::BodyTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload too large"),
            ProxyError::Internal(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        };
        (status, body).into_response()
    }
}

/// Convenience alias used across the request path.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_maps_to_502() {
        let resp = ProxyError::MissingCredential("mistral").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn keystore_failure_maps_to_502() {
        let resp = ProxyError::Keystore("timed out".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unknown_route_maps_to_404() {
        let resp = ProxyError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn oversized_body_maps_to_413() {
        let resp = ProxyError::BodyTooLarge(32 * 1024 * 1024).into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn error_display_names_the_provider() {
        let err = ProxyError::MissingCredential("mistral");
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn gateway_errors_share_a_fixed_body() {
        // The client-visible body must never vary with the failure detail.
        for err in [
            ProxyError::MissingCredential("anthropic"),
            ProxyError::Keystore("helper crashed".to_string()),
            ProxyError::Upstream("connect refused".to_string()),
        ] {
            let resp = err.into_response();
            assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        }
    }
}
