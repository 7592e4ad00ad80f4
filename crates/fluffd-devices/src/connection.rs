//! Per-device connection state machine.
//!
//! A [`DeviceConnection`] owns one link to one peripheral. It provides:
//! - connect / disconnect with idempotent semantics
//! - acknowledged writes on the three outbound channels
//! - one-shot notification waits matched by predicate
//! - persistent per-channel notification handlers
//! - the idle keep-alive loop

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{oneshot, Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{DeviceError, Result};
use crate::transport::{LinkHandle, LinkTransport, ListenChannel, NotificationSink, WriteChannel};

/// Period of the idle keep-alive loop.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(3);

/// Frame written by the keep-alive loop.
pub const IDLE_FRAME: [u8; 1] = [0x00];

/// Persistent handler for inbound frames on one listen channel.
pub type NotificationHandler = Arc<dyn Fn(ListenChannel, &[u8]) + Send + Sync>;

type Predicate = Box<dyn Fn(&[u8]) -> bool + Send>;

struct PendingWait {
    id: u64,
    predicate: Predicate,
    tx: oneshot::Sender<Vec<u8>>,
}

/// Routes inbound frames to pending waiters first, then to the channel handler.
#[derive(Default)]
struct Demux {
    waiters: SyncMutex<Vec<PendingWait>>,
    handlers: SyncMutex<HashMap<ListenChannel, NotificationHandler>>,
}

impl Demux {
    fn remove_waiter(&self, id: u64) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                waiters.remove(index);
                true
            }
            None => false,
        }
    }

    fn has_waiters(&self) -> bool {
        !self.waiters.lock().is_empty()
    }
}

impl NotificationSink for Demux {
    fn deliver(&self, channel: ListenChannel, data: &[u8]) {
        let matched = {
            let mut waiters = self.waiters.lock();
            waiters
                .iter()
                .position(|w| (w.predicate)(data))
                .map(|index| waiters.remove(index))
        };

        if let Some(waiter) = matched {
            tracing::debug!(channel = %channel, frame = %hex::encode(data), "Notification matched waiter");
            let _ = waiter.tx.send(data.to_vec());
            return;
        }

        let handler = self.handlers.lock().get(&channel).cloned();
        match handler {
            Some(handler) => handler(channel, data),
            None => {
                tracing::trace!(channel = %channel, frame = %hex::encode(data), "Unhandled notification")
            }
        }
    }
}

/// A registered one-shot wait.
///
/// The waiter is live from the moment it is created, so frames arriving before
/// [`NotificationWait::wait`] is polled are not lost. Dropping it unregisters.
pub struct NotificationWait {
    id: u64,
    demux: Arc<Demux>,
    rx: oneshot::Receiver<Vec<u8>>,
}

impl NotificationWait {
    /// Suspend until the matching frame arrives or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(link_closed()),
            Err(_) => {
                if self.demux.remove_waiter(self.id) {
                    return Err(DeviceError::Timeout(timeout.as_millis() as u64));
                }
                // Fulfilled between the deadline and the removal.
                self.rx.try_recv().map_err(|_| link_closed())
            }
        }
    }
}

fn link_closed() -> DeviceError {
    DeviceError::Connection("Link closed while waiting for notification".to_string())
}

impl Drop for NotificationWait {
    fn drop(&mut self) {
        self.demux.remove_waiter(self.id);
    }
}

/// One peripheral link and everything that hangs off it.
pub struct DeviceConnection {
    address: String,
    transport: Arc<dyn LinkTransport>,
    link: RwLock<Option<LinkHandle>>,
    demux: Arc<Demux>,
    subscribed: Mutex<HashSet<ListenChannel>>,
    idle: Mutex<Option<JoinHandle<()>>>,
    transfer: Mutex<()>,
    next_wait_id: AtomicU64,
}

impl DeviceConnection {
    pub fn new(address: impl Into<String>, transport: Arc<dyn LinkTransport>) -> Self {
        Self {
            address: address.into(),
            transport,
            link: RwLock::new(None),
            demux: Arc::new(Demux::default()),
            subscribed: Mutex::new(HashSet::new()),
            idle: Mutex::new(None),
            transfer: Mutex::new(()),
            next_wait_id: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the link handle is present and the transport reports it alive.
    pub async fn is_connected(&self) -> bool {
        match self.link.read().await.as_ref() {
            Some(link) => self.transport.is_connected(link).await,
            None => false,
        }
    }

    /// Establish the link. Succeeds immediately when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(DeviceError::Connection("No device address set".to_string()));
        }

        let mut link = self.link.write().await;
        if let Some(current) = link.as_ref() {
            if self.transport.is_connected(current).await {
                tracing::debug!(address = %self.address, "Already connected");
                return Ok(());
            }
        }

        // Drop whatever is left of a dead link before dialing again.
        if let Some(stale) = link.take() {
            let _ = self.transport.disconnect(&stale).await;
        }
        self.subscribed.lock().await.clear();

        tracing::info!(address = %self.address, "Connecting");
        match self.transport.connect(&self.address).await {
            Ok(handle) => {
                *link = Some(handle);
                tracing::info!(address = %self.address, "Connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!(address = %self.address, error = %e, "Connect failed");
                Err(DeviceError::Connection(format!(
                    "Failed to connect to {}: {}",
                    self.address, e
                )))
            }
        }
    }

    /// Stop idle, drop handlers and waiters, then release the link.
    ///
    /// Safe to call on a disconnected instance.
    pub async fn disconnect(&self) -> Result<()> {
        // Idle slot stays locked until the link is taken.
        let taken = {
            let mut idle = self.idle.lock().await;
            self.cancel_idle(&mut idle).await;
            self.link.write().await.take()
        };

        let Some(handle) = taken else {
            tracing::debug!(address = %self.address, "Disconnect requested but not connected");
            return Ok(());
        };

        self.subscribed.lock().await.clear();
        self.demux.handlers.lock().clear();
        self.demux.waiters.lock().clear();

        tracing::info!(address = %self.address, "Disconnecting");
        self.transport.disconnect(&handle).await.map_err(|e| {
            tracing::warn!(address = %self.address, error = %e, "Transport disconnect failed");
            DeviceError::from(e)
        })
    }

    async fn live_link(&self) -> Result<LinkHandle> {
        let link = self.link.read().await.clone();
        match link {
            Some(link) if self.transport.is_connected(&link).await => Ok(link),
            _ => Err(DeviceError::Connection(format!(
                "Not connected to {}",
                self.address
            ))),
        }
    }

    /// Acknowledged write on `channel`. No retry, no reconnect.
    pub async fn write(&self, channel: WriteChannel, data: &[u8]) -> Result<()> {
        let link = self.live_link().await?;
        tracing::debug!(address = %self.address, channel = %channel, frame = %hex::encode(data), "Write");
        self.transport.write(&link, channel, data).await.map_err(|e| {
            tracing::error!(address = %self.address, channel = %channel, error = %e, "Write failed");
            DeviceError::from(e)
        })
    }

    async fn ensure_subscribed(&self, channel: ListenChannel) -> Result<()> {
        let mut subscribed = self.subscribed.lock().await;
        if subscribed.contains(&channel) {
            return Ok(());
        }
        let link = self.live_link().await?;
        let sink: Arc<dyn NotificationSink> = self.demux.clone();
        self.transport.subscribe(&link, channel, sink).await?;
        subscribed.insert(channel);
        tracing::debug!(address = %self.address, channel = %channel, "Subscribed");
        Ok(())
    }

    /// Register a one-shot waiter on inbound frames without suspending.
    pub async fn expect_notification<F>(&self, predicate: F) -> Result<NotificationWait>
    where
        F: Fn(&[u8]) -> bool + Send + 'static,
    {
        if !self.is_connected().await {
            return Err(DeviceError::Connection(format!(
                "Not connected to {}",
                self.address
            )));
        }
        self.ensure_subscribed(ListenChannel::Control).await?;

        let id = self.next_wait_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.demux.waiters.lock().push(PendingWait {
            id,
            predicate: Box::new(predicate),
            tx,
        });
        Ok(NotificationWait {
            id,
            demux: Arc::clone(&self.demux),
            rx,
        })
    }

    /// Suspend until an inbound frame satisfies `predicate`.
    pub async fn wait_for_notification<F>(&self, predicate: F, timeout: Duration) -> Result<Vec<u8>>
    where
        F: Fn(&[u8]) -> bool + Send + 'static,
    {
        self.expect_notification(predicate).await?.wait(timeout).await
    }

    /// Install the persistent handler for `channel` and subscribe to it.
    pub async fn start_notifications(
        &self,
        channel: ListenChannel,
        handler: NotificationHandler,
    ) -> Result<()> {
        self.demux.handlers.lock().insert(channel, handler);
        if let Err(e) = self.ensure_subscribed(channel).await {
            self.demux.handlers.lock().remove(&channel);
            return Err(e);
        }
        tracing::info!(address = %self.address, channel = %channel, "Notifications started");
        Ok(())
    }

    /// Remove the handler for `channel` and unsubscribe.
    ///
    /// The control channel stays subscribed while waiters are pending.
    pub async fn stop_notifications(&self, channel: ListenChannel) -> Result<()> {
        self.demux.handlers.lock().remove(&channel);

        if channel == ListenChannel::Control && self.demux.has_waiters() {
            return Ok(());
        }

        let mut subscribed = self.subscribed.lock().await;
        if !subscribed.remove(&channel) {
            return Ok(());
        }
        let link = self.live_link().await?;
        self.transport.unsubscribe(&link, channel).await?;
        tracing::info!(address = %self.address, channel = %channel, "Notifications stopped");
        Ok(())
    }

    /// Start the keep-alive loop. No-op when already running or not connected.
    pub async fn start_idle(self: &Arc<Self>) {
        let mut idle = self.idle.lock().await;
        if idle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!(address = %self.address, "Idle loop already running");
            return;
        }
        if !self.is_connected().await {
            tracing::warn!(address = %self.address, "Not starting idle loop: not connected");
            return;
        }

        *idle = Some(tokio::spawn(keep_alive_loop(Arc::downgrade(self))));
        tracing::info!(address = %self.address, "Idle loop started");
    }

    /// Cancel the keep-alive loop and wait until it has fully stopped.
    pub async fn stop_idle(&self) {
        let mut idle = self.idle.lock().await;
        self.cancel_idle(&mut idle).await;
    }

    async fn cancel_idle(&self, slot: &mut Option<JoinHandle<()>>) {
        let Some(handle) = slot.take() else {
            return;
        };
        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(address = %self.address, error = %e, "Idle loop panicked"),
        }
        tracing::info!(address = %self.address, "Idle loop stopped");
    }

    pub async fn is_idle(&self) -> bool {
        self.idle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Exclusive access for multi-step transfers on this connection.
    pub async fn transfer_guard(&self) -> MutexGuard<'_, ()> {
        self.transfer.lock().await
    }
}

async fn keep_alive_loop(connection: Weak<DeviceConnection>) {
    let mut ticker = tokio::time::interval(IDLE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(conn) = connection.upgrade() else {
            break;
        };
        if !conn.is_connected().await {
            tracing::debug!(address = %conn.address, "Link gone, idle loop exiting");
            break;
        }
        if let Err(e) = conn.write(WriteChannel::Control, &IDLE_FRAME).await {
            tracing::error!(address = %conn.address, error = %e, "Keep-alive write failed, idle loop exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;

    fn connection(sim: &Arc<SimulatedTransport>, address: &str) -> Arc<DeviceConnection> {
        Arc::new(DeviceConnection::new(address, sim.clone()))
    }

    #[tokio::test]
    async fn test_connect_without_address() {
        let sim = SimulatedTransport::new();
        let conn = connection(&sim, "");
        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, DeviceError::Connection(_)));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let conn = connection(&sim, "AA:01");
        conn.connect().await.unwrap();
        conn.connect().await.unwrap();
        assert!(conn.is_connected().await);
    }

    #[tokio::test]
    async fn test_write_fails_fast_when_disconnected() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let conn = connection(&sim, "AA:01");
        let err = conn.write(WriteChannel::Control, &[0xDB]).await.unwrap_err();
        assert!(matches!(err, DeviceError::Connection(_)));
        assert!(sim.writes("AA:01").is_empty());
    }

    #[tokio::test]
    async fn test_waiter_registered_before_reply() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let conn = connection(&sim, "AA:01");
        conn.connect().await.unwrap();

        let wait = conn.expect_notification(|d| d.first() == Some(&0x24)).await.unwrap();
        assert!(sim.notify("AA:01", ListenChannel::Control, &[0x24, 0x02]));
        let frame = wait.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame, vec![0x24, 0x02]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_idle_started_during_disconnect_never_outlives_link() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        for _ in 0..50 {
            let conn = connection(&sim, "AA:01");
            conn.connect().await.unwrap();

            let starter = {
                let conn = Arc::clone(&conn);
                tokio::spawn(async move { conn.start_idle().await })
            };
            conn.disconnect().await.unwrap();
            starter.await.unwrap();

            assert!(!conn.is_idle().await);
            sim.clear_writes("AA:01");
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(sim.writes("AA:01").is_empty());
        }
    }

    #[tokio::test]
    async fn test_dropped_wait_unregisters() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:01")]);
        let conn = connection(&sim, "AA:01");
        conn.connect().await.unwrap();

        let wait = conn.expect_notification(|_| true).await.unwrap();
        drop(wait);
        assert!(!conn.demux.has_waiters());
    }
}
