//! HTTP server.

mod middleware;
pub mod router;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use fluffd_devices::LinkTransport;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::shutdown::{shutdown_signal, shutdown_with_timeout};

pub use router::create_router_with_state;
pub use types::{ServerState, MAX_REQUEST_BODY_SIZE};

/// Serve the gateway until Ctrl+C or SIGTERM, then disconnect every device.
pub async fn run(config: &GatewayConfig, transport: Arc<dyn LinkTransport>) -> anyhow::Result<()> {
    let bind = config.bind_addr()?;
    let state = ServerState::new(transport, config.timeouts.clone());
    let app = create_router_with_state(state.clone());

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!("Furby gateway listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    shutdown_with_timeout(&state).await;
    Ok(())
}
