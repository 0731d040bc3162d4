//! Secret store adapter.
//!
//! Credentials live in a platform-protected keystore keyed by
//! `(service = "thesystem/<provider_id>", account = provider_id)`. Two
//! backends are tried in order on every call: a biometric-gated helper
//! executable when one is installed next to the proxy binary, then the
//! platform keystore CLI. Nothing is cached; re-reading per request is what
//! lets a rotated credential take effect within seconds and without a
//! restart.

use async_trait::async_trait;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Keystore service prefix; the account is the bare provider id.
pub const SERVICE_PREFIX: &str = "thesystem/";

/// Name of the optional biometric-gated helper, looked up as a sibling of
/// the running executable.
const HELPER_NAME: &str = "thesystem-secret-helper";

/// Hard bound on a single keystore invocation. An unresponsive keystore
/// must not stall the request path.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("no credential stored for {0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Read-only access to stored credentials. The production implementation
/// shells out to the platform keystore; tests substitute an in-memory stub.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn read(&self, id: &str) -> Result<SecretString, KeystoreError>;
}

/// The platform-backed store used in production.
pub struct PlatformKeystore;

#[async_trait]
impl SecretStore for PlatformKeystore {
    async fn read(&self, id: &str) -> Result<SecretString, KeystoreError> {
        if let Some(helper) = helper_path() {
            // Any helper failure falls through to the plain backend; the
            // distinction is never surfaced to callers.
            if let Some(secret) = read_via_helper(&helper, id).await {
                return Ok(secret);
            }
        }
        read_via_platform_cli(id).await
    }
}

/// Keystore service name for a provider id.
pub fn service_name(id: &str) -> String {
    format!("{SERVICE_PREFIX}{id}")
}

fn helper_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let helper = exe.parent()?.join(HELPER_NAME);
    helper.is_file().then_some(helper)
}

async fn read_via_helper(helper: &Path, id: &str) -> Option<SecretString> {
    let output = run_bounded(Command::new(helper).arg("get").arg(service_name(id)).arg(id))
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    secret_from_stdout(output.stdout).ok()
}

async fn read_via_platform_cli(id: &str) -> Result<SecretString, KeystoreError> {
    let output = run_bounded(&mut platform_command(id))
        .await
        .map_err(KeystoreError::Unavailable)?;
    if !output.status.success() {
        return Err(KeystoreError::NotFound(id.to_string()));
    }
    secret_from_stdout(output.stdout)
        .map_err(|_| KeystoreError::NotFound(id.to_string()))
}

#[cfg(target_os = "macos")]
fn platform_command(id: &str) -> Command {
    let mut cmd = Command::new("security");
    cmd.arg("find-generic-password")
        .arg("-s")
        .arg(service_name(id))
        .arg("-a")
        .arg(id)
        .arg("-w");
    cmd
}

#[cfg(not(target_os = "macos"))]
fn platform_command(id: &str) -> Command {
    let mut cmd = Command::new("secret-tool");
    cmd.arg("lookup")
        .arg("service")
        .arg(service_name(id))
        .arg("account")
        .arg(id);
    cmd
}

/// Run a keystore command under the hard lookup timeout.
async fn run_bounded(cmd: &mut Command) -> Result<Output, String> {
    let result = tokio::time::timeout(LOOKUP_TIMEOUT, cmd.output()).await;
    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("keystore command failed to run: {e}")),
        Err(_) => Err("keystore lookup timed out".to_string()),
    }
}

/// A credential is the command's stdout with trailing whitespace trimmed.
/// Empty output means nothing is stored.
fn secret_from_stdout(stdout: Vec<u8>) -> Result<SecretString, ()> {
    let text = String::from_utf8(stdout).map_err(|_| ())?;
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return Err(());
    }
    Ok(SecretString::from(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn service_name_carries_prefix() {
        assert_eq!(service_name("anthropic"), "thesystem/anthropic");
        assert_eq!(service_name("github"), "thesystem/github");
    }

    #[test]
    fn stdout_is_trimmed_of_trailing_whitespace() {
        let secret = secret_from_stdout(b"sk-ant-TEST\n".to_vec()).unwrap();
        assert_eq!(secret.expose_secret(), "sk-ant-TEST");

        let secret = secret_from_stdout(b"tok  \r\n".to_vec()).unwrap();
        assert_eq!(secret.expose_secret(), "tok");
    }

    #[test]
    fn empty_stdout_is_not_a_credential() {
        assert!(secret_from_stdout(Vec::new()).is_err());
        assert!(secret_from_stdout(b"\n".to_vec()).is_err());
    }

    #[test]
    fn non_utf8_stdout_is_rejected() {
        assert!(secret_from_stdout(vec![0xff, 0xfe, 0x00]).is_err());
    }

    #[tokio::test]
    async fn missing_binary_reports_unavailable() {
        let mut cmd = Command::new("/nonexistent/agentauth-test-keystore");
        let err = run_bounded(&mut cmd).await.unwrap_err();
        assert!(err.contains("failed to run"));
    }
}
