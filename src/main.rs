//! agentauth - main entry point.
//!
//! Binds the listener, installs the admission and logging layers, and runs
//! until a termination signal arrives, after which in-flight requests get a
//! bounded grace period to drain.

use agentauth::{api::registry, AppState, PlatformKeystore, ProxyConfig};
use anyhow::Result;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present, before any environment variable is read.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ProxyConfig::from_env()?;
    let addr = config.listen_addr()?;
    let grace = Duration::from_secs(config.shutdown_grace_secs);

    let state = Arc::new(AppState::new(config, Arc::new(PlatformKeystore)));
    let app = agentauth::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("agentauth listening on {}", addr);
    tracing::info!("providers: {}", registry::provider_ids().join(", "));
    tracing::info!("health: /agentauth/health, credentials: /agentauth/credential/<id>");

    // Remote addresses must survive into the handlers; the allowlist is the
    // security boundary, not the bind address.
    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, service).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            // Listener failed on its own; nothing left to drain.
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(
                "grace period of {}s elapsed, aborting remaining handlers",
                grace.as_secs()
            );
            server_task.abort();
        }
    }

    Ok(())
}

/// Resolve when the process is asked to stop: SIGINT (ctrl-c) on every
/// platform, SIGTERM additionally on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Local-timezone ISO-8601 timestamps for every log line.
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().to_rfc3339())
    }
}

fn init_tracing() {
    // NO_COLOR disables ANSI codes for file logging.
    let no_color = std::env::var("NO_COLOR").is_ok();

    // Always append noise suppression for the HTTP stack: a bare RUST_LOG
    // of "debug" would otherwise let hyper's per-chunk logs through.
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,agentauth=debug".to_string());
    let filter =
        tracing_subscriber::EnvFilter::new(format!("{base_filter},hyper=warn,h2=warn,reqwest=warn"));

    if no_color {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(LocalTime))
            .init();
    }
}
