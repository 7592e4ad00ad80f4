//! Action dispatcher.
//!
//! Resolves a command name against the registry and runs it on one connection.

use std::sync::Arc;

use fluffd_devices::DeviceConnection;

use crate::command::{DirectCommand, Effect};
use crate::error::Result;
use crate::flash::flash_dlc;
use crate::params::Params;
use crate::registry::CommandRegistry;

/// Runs named commands against device connections.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    registry: Arc<CommandRegistry>,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Resolve, validate and run `name`, reporting the first failure.
    pub async fn try_execute(
        &self,
        conn: &Arc<DeviceConnection>,
        name: &str,
        params: &Params,
    ) -> Result<()> {
        let resolved = self.registry.resolve(name, params)?;
        if resolved.via_shortcut {
            tracing::info!(shortcut = name, target = %resolved.kind, "Expanding shortcut");
        }

        let command = DirectCommand::parse(resolved.kind, &resolved.params).map_err(|e| {
            tracing::warn!(command = name, error = %e, "Rejected parameters");
            e
        })?;

        tracing::info!(address = %conn.address(), command = %command.kind(), "Executing");
        match command.into_effect() {
            Effect::Write(frames) => {
                for frame in frames {
                    conn.write(frame.channel, &frame.bytes).await?;
                }
            }
            Effect::Idle(true) => conn.start_idle().await,
            Effect::Idle(false) => conn.stop_idle().await,
            Effect::Flash { filename, path } => {
                flash_dlc(conn, &filename, &path).await?;
            }
        }
        Ok(())
    }

    /// Like [`try_execute`](Self::try_execute), with every failure folded into `false`.
    pub async fn execute(&self, conn: &Arc<DeviceConnection>, name: &str, params: &Params) -> bool {
        match self.try_execute(conn, name, params).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(address = %conn.address(), command = name, error = %e, "Action failed");
                false
            }
        }
    }
}
