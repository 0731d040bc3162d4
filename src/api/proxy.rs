//! The proxy engine.
//!
//! Single pass per request: match the provider, capture the body, read the
//! credential, forward upstream, stream the response back. The orderings
//! here are load-bearing: the body is fully captured before the keystore
//! is touched, and the credential is read exactly once per request and
//! dropped when the handler frame exits.

use crate::api::registry::{self, AuthStyle, Provider};
use crate::api::stream::{ResponseTail, TailLoggedStream};
use crate::core::access_log::{self, AccessLogged};
use crate::core::allowlist::Allowlist;
use crate::core::config::ProxyConfig;
use crate::core::error::{ProxyError, Result};
use crate::core::keystore::{KeystoreError, SecretStore};
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state for all handlers. The allowlist and registry are immutable
/// after startup; the keystore is consulted fresh on every request.
pub struct AppState {
    pub config: ProxyConfig,
    pub allowlist: Allowlist,
    pub keystore: Arc<dyn SecretStore>,
    pub http_client: reqwest::Client,
    /// Overrides every provider's base URL. `None` in production; set to a
    /// mock server URL in integration tests.
    pub upstream_override: Option<String>,
}

impl AppState {
    pub fn new(config: ProxyConfig, keystore: Arc<dyn SecretStore>) -> Self {
        let http_client = build_http_client(&config);
        Self {
            config,
            allowlist: Allowlist::new(),
            keystore,
            http_client,
            upstream_override: None,
        }
    }

    fn upstream_base<'a>(&'a self, provider: &'a Provider) -> &'a str {
        self.upstream_override
            .as_deref()
            .unwrap_or(provider.upstream_base)
    }
}

/// Shared connection-pooled client for all upstream calls. Redirects are
/// not followed; a 3xx from a provider passes through verbatim.
fn build_http_client(config: &ProxyConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .http2_keep_alive_interval(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client")
}

/// Fallback handler: everything that is not a fixed `/agentauth/*` route
/// lands here and is either proxied or answered `404`.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let remote = addr.ip();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    match proxy_request(&state, remote, request).await {
        Ok(response) => response,
        // Route misses get the generic request line from the logging layer.
        Err(err @ ProxyError::NotFound) => err.into_response(),
        Err(err) => {
            access_log::error(remote, &method, &path, &err.to_string());
            let mut response = err.into_response();
            response.extensions_mut().insert(AccessLogged);
            response
        }
    }
}

async fn proxy_request(state: &AppState, remote: IpAddr, request: Request) -> Result<Response> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(|q| q.to_string());

    let (provider, upstream_path) =
        registry::match_path(&path).ok_or(ProxyError::NotFound)?;

    let start = Instant::now();
    let request_headers = request.headers().clone();

    // Capture the full body before the credential is ever read, so a
    // client that never commits its payload never causes a keystore read.
    let body = axum::body::to_bytes(request.into_body(), state.config.max_body_bytes)
        .await
        .map_err(|_| ProxyError::BodyTooLarge(state.config.max_body_bytes))?;

    let model = extract_model(&body);
    let body = registry::sanitize_body(provider, body);

    // The one keystore read of this request.
    let credential = state.keystore.read(provider.id).await.map_err(|e| match e {
        KeystoreError::NotFound(_) => ProxyError::MissingCredential(provider.id),
        KeystoreError::Unavailable(message) => ProxyError::Keystore(message),
    })?;

    let url = upstream_url(state.upstream_base(provider), upstream_path, query.as_deref());
    let mut builder = state.http_client.request(method.clone(), &url);
    builder = inject_auth(builder, provider.auth_style, &credential);
    builder = copy_request_headers(builder, provider, &request_headers);
    if method != Method::GET && method != Method::HEAD {
        builder = builder.body(body);
    }

    let upstream = builder
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(describe_upstream_error(&e)))?;

    let status = upstream.status();

    // The client talks plain HTTP to us and reqwest has already undone any
    // upstream compression, so re-advertising the coding would make the
    // client decompress twice.
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if name == header::CONTENT_ENCODING || name == header::TRANSFER_ENCODING {
            continue;
        }
        response_headers.append(name.clone(), value.clone());
    }

    let tail = ResponseTail {
        remote,
        method: method.to_string(),
        path,
        model,
        status: status.as_u16(),
        start,
    };

    let mut response = Response::new(Body::from_stream(TailLoggedStream::new(
        upstream.bytes_stream(),
        tail,
    )));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response.extensions_mut().insert(AccessLogged);
    Ok(response)
}

/// Best-effort `model` field for the access line. Any parse failure is `-`.
fn extract_model(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("model").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}

fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    match query {
        Some(q) => format!("{base}{path}?{q}"),
        None => format!("{base}{path}"),
    }
}

fn inject_auth(
    builder: reqwest::RequestBuilder,
    style: AuthStyle,
    credential: &SecretString,
) -> reqwest::RequestBuilder {
    match style {
        AuthStyle::Bearer => builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", credential.expose_secret()),
        ),
        AuthStyle::XApiKey => builder.header("x-api-key", credential.expose_secret()),
        AuthStyle::XGoogApiKey => builder.header("x-goog-api-key", credential.expose_secret()),
    }
}

/// Upstream headers start from empty: the credential header, then
/// `content-type`, then the provider's passthrough set, then defaults for
/// whatever the caller omitted. The client's `host`, `authorization`, and
/// `x-api-key` headers are never copied.
fn copy_request_headers(
    mut builder: reqwest::RequestBuilder,
    provider: &Provider,
    headers: &HeaderMap,
) -> reqwest::RequestBuilder {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type.clone());
    }
    for name in provider.passthrough_headers {
        if let Some(value) = headers.get(*name) {
            builder = builder.header(*name, value.clone());
        }
    }
    for (name, value) in provider.default_headers {
        if headers.get(*name).is_none() {
            builder = builder.header(*name, *value);
        }
    }
    builder
}

/// Client-facing description of an upstream transport failure. Kept to
/// fixed strings so no internal URL or header detail can leak.
fn describe_upstream_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "upstream request timed out".to_string()
    } else if error.is_connect() {
        "failed to connect to upstream".to_string()
    } else {
        "upstream request failed".to_string()
    }
}
