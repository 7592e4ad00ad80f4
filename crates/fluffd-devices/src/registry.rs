//! Registry of live device connections.
//!
//! Entries are keyed by transport address and only exist for links that
//! connected successfully. Connect and disconnect for the same address are
//! serialized; different addresses proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::connection::{DeviceConnection, NotificationHandler};
use crate::discovery::discover_furbys;
use crate::error::{DeviceError, Result};
use crate::transport::{DiscoveredDevice, LinkTransport, ListenChannel};

/// Result of a successful connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    AlreadyConnected,
    Connected,
}

/// Snapshot of one connected device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub address: String,
    pub idle: bool,
}

fn logging_handler(address: String) -> NotificationHandler {
    Arc::new(move |channel, data| {
        tracing::info!(address = %address, channel = %channel, frame = %hex::encode(data), "Notification");
    })
}

type LifecycleTable = SyncMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Holds the per-address lifecycle lock. The table entry is dropped once no
/// other caller holds or waits for it.
struct LifecycleGuard<'a> {
    table: &'a LifecycleTable,
    address: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LifecycleGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        self.guard.take();
        if table
            .get(&self.address)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.address);
        }
    }
}

/// Owns every [`DeviceConnection`] in the process.
pub struct DeviceRegistry {
    transport: Arc<dyn LinkTransport>,
    devices: RwLock<HashMap<String, Arc<DeviceConnection>>>,
    lifecycle: LifecycleTable,
}

impl DeviceRegistry {
    pub fn new(transport: Arc<dyn LinkTransport>) -> Self {
        Self {
            transport,
            devices: RwLock::new(HashMap::new()),
            lifecycle: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> Arc<dyn LinkTransport> {
        Arc::clone(&self.transport)
    }

    /// Serialize connect and disconnect for `address`.
    async fn lock_lifecycle(&self, address: &str) -> LifecycleGuard<'_> {
        let lock = self
            .lifecycle
            .lock()
            .entry(address.to_string())
            .or_default()
            .clone();
        let mut guard = LifecycleGuard {
            table: &self.lifecycle,
            address: address.to_string(),
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Scan for Furbys in range.
    pub async fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        discover_furbys(self.transport.as_ref(), timeout).await
    }

    /// Connect to `address` and start its idle loop in the background.
    pub async fn connect_device(&self, address: &str) -> Result<ConnectOutcome> {
        let _lifecycle = self.lock_lifecycle(address).await;

        let existing = self.devices.read().await.get(address).cloned();
        if let Some(conn) = existing {
            if conn.is_connected().await {
                tracing::info!(address = %address, "Already connected");
                return Ok(ConnectOutcome::AlreadyConnected);
            }
            tracing::warn!(address = %address, "Dropping stale registry entry");
            self.devices.write().await.remove(address);
            let _ = conn.disconnect().await;
        }

        let conn = Arc::new(DeviceConnection::new(address, self.transport()));
        conn.connect().await?;
        self.devices
            .write()
            .await
            .insert(address.to_string(), Arc::clone(&conn));

        for channel in ListenChannel::ALL {
            if let Err(e) = conn
                .start_notifications(channel, logging_handler(address.to_string()))
                .await
            {
                tracing::warn!(address = %address, channel = %channel, error = %e, "Could not start notifications");
            }
        }

        tokio::spawn(async move {
            conn.start_idle().await;
        });

        Ok(ConnectOutcome::Connected)
    }

    /// Disconnect and forget `address`.
    pub async fn disconnect_device(&self, address: &str) -> Result<()> {
        let _lifecycle = self.lock_lifecycle(address).await;

        let conn = self
            .devices
            .write()
            .await
            .remove(address)
            .ok_or_else(|| DeviceError::NotFound(address.to_string()))?;
        conn.disconnect().await?;
        tracing::info!(address = %address, "Device removed");
        Ok(())
    }

    /// The connection for `address`, if it is registered and live.
    pub async fn get_connected(&self, address: &str) -> Option<Arc<DeviceConnection>> {
        let conn = self.devices.read().await.get(address).cloned()?;
        if conn.is_connected().await {
            Some(conn)
        } else {
            None
        }
    }

    /// Every live connection, ordered by address.
    pub async fn connected(&self) -> Vec<Arc<DeviceConnection>> {
        let mut all: Vec<Arc<DeviceConnection>> =
            self.devices.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.address().cmp(b.address()));

        let mut live = Vec::with_capacity(all.len());
        for conn in all {
            if conn.is_connected().await {
                live.push(conn);
            }
        }
        live
    }

    pub async fn connected_addresses(&self) -> Vec<String> {
        self.connected()
            .await
            .iter()
            .map(|c| c.address().to_string())
            .collect()
    }

    pub async fn summaries(&self) -> Vec<DeviceSummary> {
        let mut out = Vec::new();
        for conn in self.connected().await {
            out.push(DeviceSummary {
                address: conn.address().to_string(),
                idle: conn.is_idle().await,
            });
        }
        out
    }

    /// Disconnect everything. Used on shutdown.
    pub async fn disconnect_all(&self) {
        let drained: Vec<(String, Arc<DeviceConnection>)> =
            self.devices.write().await.drain().collect();
        for (address, conn) in drained {
            if let Err(e) = conn.disconnect().await {
                tracing::warn!(address = %address, error = %e, "Disconnect during shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;

    #[tokio::test]
    async fn test_lifecycle_locks_are_released() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let registry = DeviceRegistry::new(sim.clone());

        for i in 0..50 {
            let address = format!("ZZ:{}", i);
            assert!(registry.connect_device(&address).await.is_err());
            assert!(registry.disconnect_device(&address).await.is_err());
        }
        assert!(registry.lifecycle.lock().is_empty());

        registry.connect_device("AA:01").await.unwrap();
        registry.disconnect_device("AA:01").await.unwrap();
        assert!(registry.lifecycle.lock().is_empty());
    }

    #[tokio::test]
    async fn test_waiting_caller_keeps_lock_entry() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let registry = Arc::new(DeviceRegistry::new(sim.clone()));

        let held = registry.lock_lifecycle("AA:01").await;
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.connect_device("AA:01").await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        drop(held);
        assert_eq!(registry.lifecycle.lock().len(), 1);

        assert_eq!(waiter.await.unwrap().unwrap(), ConnectOutcome::Connected);
        assert!(registry.lifecycle.lock().is_empty());
        registry.disconnect_all().await;
    }
}
