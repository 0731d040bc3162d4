//! Per-request log lines.
//!
//! One line per terminal event, in three shapes: an admitted request, a
//! denial, and an error. The ISO-8601 timestamp is contributed by the
//! subscriber's timer; the functions here format the rest of the line.
//! Request and response bodies are never rendered, and no credential ever
//! reaches this module.

use std::net::IpAddr;

/// Tracing target for access lines, so they can be filtered or redirected
/// independently of diagnostic output.
pub const ACCESS_TARGET: &str = "agentauth::access";

/// Marker extension: the response has already produced its terminal log
/// line (or will, when its body stream ends), so the generic logging
/// middleware must not add another.
#[derive(Clone, Copy, Debug)]
pub struct AccessLogged;

/// Line for an admitted request that ran to completion.
pub fn request_line(
    remote: IpAddr,
    method: &str,
    path: &str,
    model: &str,
    status: u16,
    elapsed_ms: u128,
) -> String {
    format!("{remote} {method} {path} model={model} status={status} {elapsed_ms}ms")
}

/// Line for a connection turned away by the allowlist.
pub fn denied_line(remote: IpAddr, method: &str, path: &str) -> String {
    format!("DENIED {remote} {method} {path}")
}

/// Line for a request that failed inside the proxy.
pub fn error_line(remote: IpAddr, method: &str, path: &str, message: &str) -> String {
    format!("ERROR {remote} {method} {path} — {message}")
}

pub fn request(remote: IpAddr, method: &str, path: &str, model: &str, status: u16, elapsed_ms: u128) {
    tracing::info!(
        target: ACCESS_TARGET,
        "{}",
        request_line(remote, method, path, model, status, elapsed_ms)
    );
}

pub fn denied(remote: IpAddr, method: &str, path: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", denied_line(remote, method, path));
}

pub fn error(remote: IpAddr, method: &str, path: &str, message: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", error_line(remote, method, path, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn request_line_shape() {
        let line = request_line(
            ip("127.0.0.1"),
            "POST",
            "/anthropic/v1/messages",
            "claude-3-5-sonnet",
            200,
            843,
        );
        assert_eq!(
            line,
            "127.0.0.1 POST /anthropic/v1/messages model=claude-3-5-sonnet status=200 843ms"
        );
    }

    #[test]
    fn request_line_with_unknown_model() {
        let line = request_line(ip("10.0.0.3"), "GET", "/openai/v1/models", "-", 200, 12);
        assert_eq!(line, "10.0.0.3 GET /openai/v1/models model=- status=200 12ms");
    }

    #[test]
    fn denied_line_shape() {
        let line = denied_line(ip("8.8.8.8"), "GET", "/agentauth/health");
        assert_eq!(line, "DENIED 8.8.8.8 GET /agentauth/health");
    }

    #[test]
    fn error_line_shape() {
        let line = error_line(
            ip("127.0.0.1"),
            "POST",
            "/mistral/v1/chat/completions",
            "no stored credential for provider mistral",
        );
        assert_eq!(
            line,
            "ERROR 127.0.0.1 POST /mistral/v1/chat/completions — no stored credential for provider mistral"
        );
    }

    #[test]
    fn ipv6_remote_renders() {
        let line = denied_line(ip("::1"), "GET", "/");
        assert_eq!(line, "DENIED ::1 GET /");
    }
}
