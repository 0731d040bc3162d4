//! agentauth - credential-gating reverse proxy for a sandboxed agent fleet.
//!
//! Sandboxed workloads call model and code-hosting APIs through this
//! process instead of holding long-lived keys themselves. Per request the
//! proxy admits by source network, reads the real credential from the
//! platform secret store, injects it upstream, and streams the provider's
//! response back byte for byte.
//!
//! The library exposes the router and state so integration tests can drive
//! the full HTTP surface in-process.

pub mod api;
pub mod core;

pub use crate::api::{router, AppState};
pub use crate::core::{Allowlist, PlatformKeystore, ProxyConfig, ProxyError, SecretStore};
