//! btleplug-backed transport for real Furby hardware.
//!
//! Logical channels map onto the Furby GATT characteristics:
//!
//! | Channel | Characteristic |
//! |---------|----------------|
//! | control-write | GeneralPlus write |
//! | control-listen | GeneralPlus listen |
//! | secondary-write | Nordic write |
//! | secondary-listen | Nordic listen |
//! | bulk-write | file write |

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    DiscoveredDevice, LinkHandle, LinkTransport, ListenChannel, NotificationSink, TransportError,
    WriteChannel,
};

pub const FURBY_SERVICE: Uuid = Uuid::from_u128(0xdab91435_b5a1_e29c_b041_bcd562613bde);
pub const GP_WRITE: Uuid = Uuid::from_u128(0xdab91383_b5a1_e29c_b041_bcd562613bde);
pub const GP_LISTEN: Uuid = Uuid::from_u128(0xdab91382_b5a1_e29c_b041_bcd562613bde);
pub const NORDIC_WRITE: Uuid = Uuid::from_u128(0xdab90757_b5a1_e29c_b041_bcd562613bde);
pub const NORDIC_LISTEN: Uuid = Uuid::from_u128(0xdab90756_b5a1_e29c_b041_bcd562613bde);
pub const FILE_WRITE: Uuid = Uuid::from_u128(0xdab90758_b5a1_e29c_b041_bcd562613bde);

fn write_uuid(channel: WriteChannel) -> Uuid {
    match channel {
        WriteChannel::Control => GP_WRITE,
        WriteChannel::Secondary => NORDIC_WRITE,
        WriteChannel::Bulk => FILE_WRITE,
    }
}

fn listen_uuid(channel: ListenChannel) -> Uuid {
    match channel {
        ListenChannel::Control => GP_LISTEN,
        ListenChannel::Secondary => NORDIC_LISTEN,
    }
}

fn listen_channel(uuid: Uuid) -> Option<ListenChannel> {
    ListenChannel::ALL.into_iter().find(|c| listen_uuid(*c) == uuid)
}

type SinkTable = Arc<SyncMutex<HashMap<ListenChannel, Arc<dyn NotificationSink>>>>;

struct BtleLink {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    sinks: SinkTable,
    pump: JoinHandle<()>,
}

impl BtleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic, TransportError> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| TransportError::CharacteristicNotFound(uuid.to_string()))
    }
}

/// Transport over the first Bluetooth adapter of the host.
pub struct BtleTransport {
    adapter: Adapter,
    links: Mutex<HashMap<u64, BtleLink>>,
    next_link: AtomicU64,
}

impl BtleTransport {
    /// Open the first available adapter.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::Adapter(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| TransportError::Adapter(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Adapter("No Bluetooth adapter found".to_string()))?;

        Ok(Self {
            adapter,
            links: Mutex::new(HashMap::new()),
            next_link: AtomicU64::new(0),
        })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address))
            .ok_or_else(|| TransportError::UnknownPeripheral(address.to_string()))
    }
}

#[async_trait]
impl LinkTransport for BtleTransport {
    async fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::Scan(e.to_string()))?;
        tokio::time::sleep(timeout).await;
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| TransportError::Scan(e.to_string()))?;

        let mut found = Vec::new();
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Scan(e.to_string()))?;
        for peripheral in peripherals {
            let name = match peripheral.properties().await {
                Ok(Some(props)) => props.local_name.unwrap_or_default(),
                _ => String::new(),
            };
            found.push(DiscoveredDevice {
                name,
                address: peripheral.address().to_string(),
            });
        }
        Ok(found)
    }

    async fn connect(&self, address: &str) -> Result<LinkHandle, TransportError> {
        let peripheral = self.find_peripheral(address).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Err(e) = peripheral.discover_services().await {
            let _ = peripheral.disconnect().await;
            return Err(TransportError::Connect(e.to_string()));
        }

        let characteristics: HashMap<Uuid, Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == FURBY_SERVICE || listen_channel(c.uuid).is_some())
            .map(|c| (c.uuid, c))
            .collect();

        let mut stream = match peripheral.notifications().await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = peripheral.disconnect().await;
                return Err(TransportError::Connect(e.to_string()));
            }
        };

        let sinks: SinkTable = Arc::new(SyncMutex::new(HashMap::new()));
        let pump_sinks = Arc::clone(&sinks);
        let pump = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let Some(channel) = listen_channel(notification.uuid) else {
                    continue;
                };
                let sink = pump_sinks.lock().get(&channel).cloned();
                if let Some(sink) = sink {
                    sink.deliver(channel, &notification.value);
                }
            }
        });

        let id = self.next_link.fetch_add(1, Ordering::Relaxed) + 1;
        self.links.lock().await.insert(
            id,
            BtleLink {
                peripheral,
                characteristics,
                sinks,
                pump,
            },
        );
        tracing::debug!(address = %address, link = id, "BLE link established");

        Ok(LinkHandle {
            id,
            address: address.to_string(),
        })
    }

    async fn disconnect(&self, link: &LinkHandle) -> Result<(), TransportError> {
        let Some(entry) = self.links.lock().await.remove(&link.id) else {
            return Ok(());
        };
        entry.pump.abort();
        entry
            .peripheral
            .disconnect()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))
    }

    async fn is_connected(&self, link: &LinkHandle) -> bool {
        let links = self.links.lock().await;
        match links.get(&link.id) {
            Some(entry) => entry.peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn write(
        &self,
        link: &LinkHandle,
        channel: WriteChannel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let (peripheral, characteristic) = {
            let links = self.links.lock().await;
            let entry = links.get(&link.id).ok_or(TransportError::LinkClosed)?;
            (
                entry.peripheral.clone(),
                entry.characteristic(write_uuid(channel))?.clone(),
            )
        };
        peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn subscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<(), TransportError> {
        let (peripheral, characteristic, sinks) = {
            let links = self.links.lock().await;
            let entry = links.get(&link.id).ok_or(TransportError::LinkClosed)?;
            (
                entry.peripheral.clone(),
                entry.characteristic(listen_uuid(channel))?.clone(),
                Arc::clone(&entry.sinks),
            )
        };
        sinks.lock().insert(channel, sink);
        if let Err(e) = peripheral.subscribe(&characteristic).await {
            sinks.lock().remove(&channel);
            return Err(TransportError::Subscription(e.to_string()));
        }
        Ok(())
    }

    async fn unsubscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
    ) -> Result<(), TransportError> {
        let (peripheral, characteristic, sinks) = {
            let links = self.links.lock().await;
            let entry = links.get(&link.id).ok_or(TransportError::LinkClosed)?;
            (
                entry.peripheral.clone(),
                entry.characteristic(listen_uuid(channel))?.clone(),
                Arc::clone(&entry.sinks),
            )
        };
        sinks.lock().remove(&channel);
        peripheral
            .unsubscribe(&characteristic)
            .await
            .map_err(|e| TransportError::Subscription(e.to_string()))
    }
}
