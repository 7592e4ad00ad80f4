//! Graceful shutdown handling for the gateway.

use std::time::Duration;

use crate::server::ServerState;

/// Shutdown timeout in seconds.
const SHUTDOWN_TIMEOUT: u64 = 30;

/// Wait for Ctrl+C or SIGTERM.
///
/// A signal source that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Release every device link.
pub async fn cleanup_resources(state: &ServerState) {
    let connected = state.devices.connected_addresses().await;
    tracing::info!("Disconnecting {} device(s)...", connected.len());
    state.devices.disconnect_all().await;

    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    tracing::info!("Gateway uptime: {} seconds", uptime);
}

/// Run cleanup, giving up after [`SHUTDOWN_TIMEOUT`].
pub async fn shutdown_with_timeout(state: &ServerState) {
    match tokio::time::timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT),
        cleanup_resources(state),
    )
    .await
    {
        Ok(()) => tracing::info!("Graceful shutdown completed"),
        Err(_) => tracing::warn!(
            "Shutdown cleanup timed out after {}s, forcing exit",
            SHUTDOWN_TIMEOUT
        ),
    }
}
