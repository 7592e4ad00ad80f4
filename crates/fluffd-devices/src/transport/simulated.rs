//! In-process transport simulator.
//!
//! Holds a table of virtual peripherals that can be scanned, connected and
//! written to without radio hardware. Every write is recorded per peripheral,
//! and tests can inject notifications, force failures, or have a peripheral
//! answer file-transfer prepare frames on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    DiscoveredDevice, LinkHandle, LinkTransport, ListenChannel, NotificationSink, TransportError,
    WriteChannel,
};

/// Frame a peripheral sends once it is ready to receive a file.
const READY_MARKER: [u8; 2] = [0x24, 0x02];
/// First byte of a file-transfer prepare frame.
const PREPARE_OPCODE: u8 = 0x50;

/// A write observed by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub channel: WriteChannel,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct SimPeripheral {
    name: String,
    link_id: Option<u64>,
    fail_connect: bool,
    fail_writes: bool,
    auto_ready: bool,
    writes: Vec<RecordedWrite>,
    sinks: HashMap<ListenChannel, Arc<dyn NotificationSink>>,
}

/// Simulated transport shared between the gateway and tests.
#[derive(Default)]
pub struct SimulatedTransport {
    peripherals: Mutex<HashMap<String, SimPeripheral>>,
    next_link: AtomicU64,
    write_latency: Mutex<Duration>,
}

impl SimulatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a simulator pre-populated with `(name, address)` peripherals.
    pub fn with_devices<I, N, A>(devices: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: Into<String>,
    {
        let sim = Self::new();
        for (name, address) in devices {
            sim.add_device(name, address);
        }
        sim
    }

    /// Register a peripheral that advertises under `name`.
    pub fn add_device(&self, name: impl Into<String>, address: impl Into<String>) {
        self.peripherals.lock().insert(
            address.into(),
            SimPeripheral {
                name: name.into(),
                ..Default::default()
            },
        );
    }

    pub fn set_fail_connect(&self, address: &str, fail: bool) {
        if let Some(p) = self.peripherals.lock().get_mut(address) {
            p.fail_connect = fail;
        }
    }

    pub fn set_fail_writes(&self, address: &str, fail: bool) {
        if let Some(p) = self.peripherals.lock().get_mut(address) {
            p.fail_writes = fail;
        }
    }

    /// Answer every prepare frame with the ready marker on the control channel.
    pub fn set_auto_ready(&self, address: &str, enabled: bool) {
        if let Some(p) = self.peripherals.lock().get_mut(address) {
            p.auto_ready = enabled;
        }
    }

    /// Delay applied to every write, measured on the tokio clock.
    pub fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.lock() = latency;
    }

    /// Writes recorded for `address`, in delivery order.
    pub fn writes(&self, address: &str) -> Vec<RecordedWrite> {
        self.peripherals
            .lock()
            .get(address)
            .map(|p| p.writes.clone())
            .unwrap_or_default()
    }

    /// Recorded writes on a single channel.
    pub fn writes_on(&self, address: &str, channel: WriteChannel) -> Vec<Vec<u8>> {
        self.writes(address)
            .into_iter()
            .filter(|w| w.channel == channel)
            .map(|w| w.data)
            .collect()
    }

    pub fn clear_writes(&self, address: &str) {
        if let Some(p) = self.peripherals.lock().get_mut(address) {
            p.writes.clear();
        }
    }

    pub fn is_linked(&self, address: &str) -> bool {
        self.peripherals
            .lock()
            .get(address)
            .is_some_and(|p| p.link_id.is_some())
    }

    pub fn is_subscribed(&self, address: &str, channel: ListenChannel) -> bool {
        self.peripherals
            .lock()
            .get(address)
            .is_some_and(|p| p.sinks.contains_key(&channel))
    }

    /// Push a notification from the peripheral. Returns false when nobody is subscribed.
    pub fn notify(&self, address: &str, channel: ListenChannel, data: &[u8]) -> bool {
        let sink = self
            .peripherals
            .lock()
            .get(address)
            .and_then(|p| p.sinks.get(&channel).cloned());
        match sink {
            Some(sink) => {
                sink.deliver(channel, data);
                true
            }
            None => false,
        }
    }

    /// Simulate the peripheral dropping the link.
    pub fn drop_link(&self, address: &str) {
        if let Some(p) = self.peripherals.lock().get_mut(address) {
            p.link_id = None;
            p.sinks.clear();
        }
    }

    fn check_link<'a>(
        peripherals: &'a mut HashMap<String, SimPeripheral>,
        link: &LinkHandle,
    ) -> Result<&'a mut SimPeripheral, TransportError> {
        match peripherals.get_mut(&link.address) {
            Some(p) if p.link_id == Some(link.id) => Ok(p),
            Some(_) => Err(TransportError::LinkClosed),
            None => Err(TransportError::UnknownPeripheral(link.address.clone())),
        }
    }
}

#[async_trait]
impl LinkTransport for SimulatedTransport {
    async fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        tokio::time::sleep(timeout).await;
        let mut found: Vec<DiscoveredDevice> = self
            .peripherals
            .lock()
            .iter()
            .map(|(address, p)| DiscoveredDevice {
                name: p.name.clone(),
                address: address.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(found)
    }

    async fn connect(&self, address: &str) -> Result<LinkHandle, TransportError> {
        let mut peripherals = self.peripherals.lock();
        let p = peripherals
            .get_mut(address)
            .ok_or_else(|| TransportError::UnknownPeripheral(address.to_string()))?;
        if p.fail_connect {
            return Err(TransportError::Connect(format!(
                "{} did not respond",
                address
            )));
        }
        let id = self.next_link.fetch_add(1, Ordering::Relaxed) + 1;
        p.link_id = Some(id);
        p.sinks.clear();
        Ok(LinkHandle {
            id,
            address: address.to_string(),
        })
    }

    async fn disconnect(&self, link: &LinkHandle) -> Result<(), TransportError> {
        if let Some(p) = self.peripherals.lock().get_mut(&link.address) {
            if p.link_id == Some(link.id) {
                p.link_id = None;
                p.sinks.clear();
            }
        }
        Ok(())
    }

    async fn is_connected(&self, link: &LinkHandle) -> bool {
        self.peripherals
            .lock()
            .get(&link.address)
            .is_some_and(|p| p.link_id == Some(link.id))
    }

    async fn write(
        &self,
        link: &LinkHandle,
        channel: WriteChannel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let latency = *self.write_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let ready_sink = {
            let mut peripherals = self.peripherals.lock();
            let p = Self::check_link(&mut peripherals, link)?;
            if p.fail_writes {
                return Err(TransportError::Write(format!(
                    "{} rejected write on {}",
                    link.address, channel
                )));
            }
            p.writes.push(RecordedWrite {
                channel,
                data: data.to_vec(),
            });

            let is_prepare =
                channel == WriteChannel::Control && data.first() == Some(&PREPARE_OPCODE);
            if p.auto_ready && is_prepare {
                p.sinks.get(&ListenChannel::Control).cloned()
            } else {
                None
            }
        };

        if let Some(sink) = ready_sink {
            sink.deliver(ListenChannel::Control, &READY_MARKER);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<(), TransportError> {
        let mut peripherals = self.peripherals.lock();
        let p = Self::check_link(&mut peripherals, link)?;
        p.sinks.insert(channel, sink);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
    ) -> Result<(), TransportError> {
        let mut peripherals = self.peripherals.lock();
        let p = Self::check_link(&mut peripherals, link)?;
        p.sinks.remove(&channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_unknown_peripheral() {
        let sim = SimulatedTransport::new();
        let err = sim.connect("AA:BB").await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeripheral(_)));
    }

    #[tokio::test]
    async fn test_stale_handle_rejected_after_reconnect() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:BB")]);
        let first = sim.connect("AA:BB").await.unwrap();
        sim.disconnect(&first).await.unwrap();
        let second = sim.connect("AA:BB").await.unwrap();

        assert!(!sim.is_connected(&first).await);
        assert!(sim.is_connected(&second).await);
        let err = sim.write(&first, WriteChannel::Control, &[0x00]).await.unwrap_err();
        assert!(matches!(err, TransportError::LinkClosed));
    }

    #[tokio::test]
    async fn test_writes_recorded_in_order() {
        let sim = SimulatedTransport::with_devices([("Furby", "AA:BB")]);
        let link = sim.connect("AA:BB").await.unwrap();
        sim.write(&link, WriteChannel::Control, &[0xDB]).await.unwrap();
        sim.write(&link, WriteChannel::Bulk, &[1, 2, 3]).await.unwrap();

        let writes = sim.writes("AA:BB");
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].data, vec![0xDB]);
        assert_eq!(writes[1].channel, WriteChannel::Bulk);
        assert_eq!(sim.writes_on("AA:BB", WriteChannel::Bulk), vec![vec![1, 2, 3]]);
    }
}
