//! Runtime settings for the proxy.
//!
//! Only two environment variables are trusted: `AGENTAUTH_PORT` and
//! `AGENTAUTH_BIND`. Everything else is a fixed operational constant;
//! in particular no credential can ever arrive via the environment.

use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Listener port when `AGENTAUTH_PORT` is unset.
pub const DEFAULT_PORT: u16 = 9999;

/// Bind address when `AGENTAUTH_BIND` is unset. The allowlist is the
/// security boundary, not the bind address, so the VM bridge can reach us.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the listener to.
    pub bind: String,

    /// Listener port.
    pub port: u16,

    /// Per-request deadline for upstream calls. Long enough for the
    /// slowest expected streaming completion.
    pub request_timeout_secs: u64,

    /// Ceiling on a captured request body.
    pub max_body_bytes: usize,

    /// How long in-flight requests may drain after a termination signal.
    pub shutdown_grace_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: 600,
            max_body_bytes: 32 * 1024 * 1024,
            shutdown_grace_secs: 30,
        }
    }
}

impl ProxyConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("AGENTAUTH_PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid AGENTAUTH_PORT value: {port:?}"))?;
        }
        if let Ok(bind) = std::env::var("AGENTAUTH_BIND") {
            let bind = bind.trim();
            if !bind.is_empty() {
                config.bind = bind.to_string();
            }
        }

        Ok(config)
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.bind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.port, 9999);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.max_body_bytes, 32 * 1024 * 1024);
        assert_eq!(config.request_timeout_secs, 600);
        assert_eq!(config.shutdown_grace_secs, 30);
    }

    #[test]
    fn listen_addr_combines_bind_and_port() {
        let config = ProxyConfig {
            bind: "127.0.0.1".to_string(),
            port: 4242,
            ..ProxyConfig::default()
        };
        let addr = config.listen_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:4242");
    }

    #[test]
    fn listen_addr_rejects_garbage_bind() {
        let config = ProxyConfig {
            bind: "not an address".to_string(),
            ..ProxyConfig::default()
        };
        assert!(config.listen_addr().is_err());
    }
}
