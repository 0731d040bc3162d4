//! Static provider registry.
//!
//! The sole place where upstream origins, credential injection styles, and
//! header policy are declared. The table is a compile-time constant on
//! purpose: a misdeclared upstream is a trust-boundary bug, not a user
//! setting, so adding a provider is an edit + recompile + redeploy plus a
//! `keys set` in the secret store.

use bytes::Bytes;
use serde_json::Value;

/// How the credential is attached to the upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>`
    XApiKey,
    /// `x-goog-api-key: <key>`
    XGoogApiKey,
}

/// One upstream API reachable through the proxy. The `id` doubles as the
/// URL prefix and the secret-store account name.
#[derive(Debug)]
pub struct Provider {
    pub id: &'static str,
    pub upstream_base: &'static str,
    pub auth_style: AuthStyle,
    /// Request headers copied verbatim onto the upstream call, beyond the
    /// always-copied `content-type`.
    pub passthrough_headers: &'static [&'static str],
    /// Header values applied when the caller omits the header.
    pub default_headers: &'static [(&'static str, &'static str)],
    /// Drop the `context_management` field from JSON bodies. Compatibility
    /// shim for upstream accounts without the preview entitlement.
    pub strip_context_management: bool,
}

const NO_HEADERS: &[&str] = &[];
const NO_DEFAULTS: &[(&str, &str)] = &[];

/// Registered providers, scanned in definition order.
pub const PROVIDERS: &[Provider] = &[
    Provider {
        id: "anthropic",
        upstream_base: "https://api.anthropic.com",
        auth_style: AuthStyle::XApiKey,
        passthrough_headers: &["anthropic-version", "anthropic-beta"],
        default_headers: &[("anthropic-version", "2023-06-01")],
        strip_context_management: true,
    },
    Provider {
        id: "openai",
        upstream_base: "https://api.openai.com",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    Provider {
        id: "xai",
        upstream_base: "https://api.x.ai",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    // Alias for the same upstream; keeps its own secret-store account.
    Provider {
        id: "grok",
        upstream_base: "https://api.x.ai",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    Provider {
        id: "google",
        upstream_base: "https://generativelanguage.googleapis.com",
        auth_style: AuthStyle::XGoogApiKey,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    Provider {
        id: "mistral",
        upstream_base: "https://api.mistral.ai",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    Provider {
        id: "groq",
        upstream_base: "https://api.groq.com",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
    Provider {
        id: "deepseek",
        upstream_base: "https://api.deepseek.com",
        auth_style: AuthStyle::Bearer,
        passthrough_headers: NO_HEADERS,
        default_headers: NO_DEFAULTS,
        strip_context_management: false,
    },
];

/// Registered provider ids, in definition order.
pub fn provider_ids() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.id).collect()
}

/// Match a request path against the registry.
///
/// The first path segment must equal a provider id exactly; matching is
/// case-sensitive and anchored with a trailing-slash test, so `/openaix`
/// never matches `openai`. Returns the provider and the remaining upstream
/// path (empty or starting with `/`).
pub fn match_path(path: &str) -> Option<(&'static Provider, &str)> {
    let rest = path.strip_prefix('/')?;
    for provider in PROVIDERS {
        if let Some(tail) = rest.strip_prefix(provider.id) {
            if tail.is_empty() || tail.starts_with('/') {
                return Some((provider, tail));
            }
        }
    }
    None
}

/// Apply provider-specific body transforms before forwarding.
///
/// Only Anthropic has one today: delete `context_management` and
/// re-serialize. Bodies that are not JSON objects, or that lack the field,
/// pass through untouched.
pub fn sanitize_body(provider: &Provider, body: Bytes) -> Bytes {
    if !provider.strip_context_management {
        return body;
    }
    let Ok(mut value) = serde_json::from_slice::<Value>(&body) else {
        return body;
    };
    let Some(obj) = value.as_object_mut() else {
        return body;
    };
    if obj.remove("context_management").is_none() {
        return body;
    }
    match serde_json::to_vec(&value) {
        Ok(rewritten) => Bytes::from(rewritten),
        Err(_) => body,
    }
}
