//! Server state shared by every handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fluffd_commands::{ActionDispatcher, CommandRegistry, CommandRouter};
use fluffd_devices::{DeviceRegistry, LinkTransport};
use tokio::runtime::Handle;

use crate::config::TimeoutConfig;
use crate::models::ErrorResponse;

/// Maximum request body size (1MB).
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

#[derive(Clone)]
pub struct ServerState {
    /// Live device connections.
    pub devices: Arc<DeviceRegistry>,
    /// Command catalog served by `/list`.
    pub commands: Arc<CommandRegistry>,
    /// Targeted and broadcast command routing.
    pub router: CommandRouter,
    /// Per-operation budgets.
    pub timeouts: TimeoutConfig,
    /// Runtime that owns device state; every device operation is spawned here.
    pub runtime: Handle,
    /// Server start timestamp.
    pub started_at: i64,
}

impl ServerState {
    /// Build state around `transport`. Must be called from within a tokio runtime.
    pub fn new(transport: Arc<dyn LinkTransport>, timeouts: TimeoutConfig) -> Self {
        let devices = Arc::new(DeviceRegistry::new(transport));
        let commands = Arc::new(CommandRegistry::builtin());
        let router = CommandRouter::new(
            Arc::clone(&devices),
            ActionDispatcher::new(Arc::clone(&commands)),
        );

        Self {
            devices,
            commands,
            router,
            timeouts,
            runtime: Handle::current(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Hand `op` to the device runtime and wait at most `limit` for its result.
    ///
    /// On timeout the operation keeps running; only the HTTP caller stops waiting.
    pub async fn run_device_op<F, T>(
        &self,
        operation: &str,
        limit: Duration,
        op: F,
    ) -> Result<T, ErrorResponse>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.runtime.spawn(op);
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(operation, error = %e, "Device operation aborted");
                Err(ErrorResponse::internal(format!("{} aborted: {}", operation, e)))
            }
            Err(_) => {
                tracing::warn!(operation, limit_secs = limit.as_secs(), "Device operation timed out");
                Err(ErrorResponse::timeout(operation, limit))
            }
        }
    }
}
