//! Targeted and broadcast command routing.

use std::fmt;
use std::sync::Arc;

use fluffd_devices::DeviceRegistry;
use serde::Serialize;
use thiserror::Error;

use crate::dispatcher::ActionDispatcher;
use crate::params::Params;

/// Why a dispatch as a whole failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Error: Target Furby {0} not found or not connected.")]
    TargetNotFound(String),

    #[error("Error: No Furbys connected for broadcast.")]
    NoDevicesConnected,

    #[error("{0}")]
    Failed(String),
}

/// Per-device tally of a broadcast.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastSummary {
    pub command: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BroadcastSummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// At least one device ran the command.
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

impl fmt::Display for BroadcastSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Broadcast '{}': {} successful, {} failed.",
            self.command,
            self.success_count(),
            self.failure_count()
        )?;
        if !self.failed.is_empty() {
            let failures: Vec<String> = self
                .failed
                .iter()
                .map(|(address, reason)| format!("{}: {}", address, reason))
                .collect();
            write!(f, " Failures: [{}]", failures.join("; "))?;
        }
        Ok(())
    }
}

/// Successful dispatch.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Targeted { address: String },
    Broadcast(BroadcastSummary),
}

impl DispatchOutcome {
    /// Value reported to HTTP clients as `details`.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Targeted { .. } => serde_json::Value::Bool(true),
            Self::Broadcast(summary) => serde_json::Value::String(summary.to_string()),
        }
    }
}

/// Sends commands to one device or fans them out to all connected devices.
#[derive(Clone)]
pub struct CommandRouter {
    devices: Arc<DeviceRegistry>,
    dispatcher: ActionDispatcher,
}

impl CommandRouter {
    pub fn new(devices: Arc<DeviceRegistry>, dispatcher: ActionDispatcher) -> Self {
        Self {
            devices,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    /// Run `command` on `target`, or on every connected device when `target` is `None`.
    pub async fn dispatch(
        &self,
        command: &str,
        params: &Params,
        target: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        match target {
            Some(address) => self.dispatch_one(command, params, address).await,
            None => self.broadcast(command, params).await,
        }
    }

    async fn dispatch_one(
        &self,
        command: &str,
        params: &Params,
        address: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let conn = self
            .devices
            .get_connected(address)
            .await
            .ok_or_else(|| DispatchError::TargetNotFound(address.to_string()))?;

        self.dispatcher
            .try_execute(&conn, command, params)
            .await
            .map_err(|e| {
                tracing::warn!(address, command, error = %e, "Targeted command failed");
                DispatchError::Failed(format!("Command '{}' execution failed: {}", command, e))
            })?;

        Ok(DispatchOutcome::Targeted {
            address: address.to_string(),
        })
    }

    async fn broadcast(
        &self,
        command: &str,
        params: &Params,
    ) -> Result<DispatchOutcome, DispatchError> {
        let targets = self.devices.connected().await;
        if targets.is_empty() {
            return Err(DispatchError::NoDevicesConnected);
        }
        tracing::info!(command, targets = targets.len(), "Broadcasting");

        // One task per device; a panicked run counts as that device failing.
        let runs: Vec<_> = targets
            .into_iter()
            .map(|conn| {
                let dispatcher = self.dispatcher.clone();
                let command = command.to_string();
                let params = params.clone();
                let address = conn.address().to_string();
                let handle = tokio::spawn(async move {
                    dispatcher.try_execute(&conn, &command, &params).await
                });
                (address, handle)
            })
            .collect();

        let (addresses, handles): (Vec<String>, Vec<_>) = runs.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let mut summary = BroadcastSummary {
            command: command.to_string(),
            ..Default::default()
        };
        for (address, result) in addresses.into_iter().zip(results) {
            match result {
                Ok(Ok(())) => summary.succeeded.push(address),
                Ok(Err(e)) => {
                    tracing::warn!(address = %address, command, error = %e, "Broadcast member failed");
                    summary.failed.push((address, e.to_string()));
                }
                Err(e) => {
                    tracing::error!(address = %address, command, error = %e, "Broadcast member aborted");
                    summary.failed.push((address, e.to_string()));
                }
            }
        }

        tracing::info!("{}", summary);
        if summary.is_success() {
            Ok(DispatchOutcome::Broadcast(summary))
        } else {
            Err(DispatchError::Failed(summary.to_string()))
        }
    }
}
