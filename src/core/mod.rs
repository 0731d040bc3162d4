//! Core functionality: configuration, errors, admission, secrets, logging.

pub mod access_log;
pub mod allowlist;
pub mod config;
pub mod error;
pub mod keystore;
pub mod middleware;

pub use allowlist::Allowlist;
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use keystore::{KeystoreError, PlatformKeystore, SecretStore};
