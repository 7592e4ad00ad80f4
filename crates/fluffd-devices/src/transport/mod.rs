//! Link transport interface.
//!
//! The transport owns the radio: scanning, link establishment, characteristic
//! writes and notification subscriptions. Everything above it talks in terms of
//! logical channels rather than GATT characteristics.

pub mod simulated;

#[cfg(feature = "ble")]
pub mod btle;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use simulated::{RecordedWrite, SimulatedTransport};

#[cfg(feature = "ble")]
pub use btle::BtleTransport;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The radio adapter is missing or unusable.
    #[error("Adapter unavailable: {0}")]
    Adapter(String),

    /// No peripheral with the given address is known to the transport.
    #[error("Unknown peripheral: {0}")]
    UnknownPeripheral(String),

    /// Link establishment failed.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The link handle no longer refers to a live link.
    #[error("Link closed")]
    LinkClosed,

    /// A characteristic write was not acknowledged.
    #[error("Write failed: {0}")]
    Write(String),

    /// Subscribing or unsubscribing a characteristic failed.
    #[error("Subscription failed: {0}")]
    Subscription(String),

    /// Required characteristic is not exposed by the peripheral.
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    /// Scan failed.
    #[error("Scan failed: {0}")]
    Scan(String),
}

/// Outbound logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteChannel {
    /// Primary command channel.
    Control,
    /// Secondary radio-controller channel.
    Secondary,
    /// File transfer channel.
    Bulk,
}

impl fmt::Display for WriteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control-write"),
            Self::Secondary => write!(f, "secondary-write"),
            Self::Bulk => write!(f, "bulk-write"),
        }
    }
}

/// Inbound logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenChannel {
    Control,
    Secondary,
}

impl ListenChannel {
    pub const ALL: [ListenChannel; 2] = [ListenChannel::Control, ListenChannel::Secondary];
}

impl fmt::Display for ListenChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control-listen"),
            Self::Secondary => write!(f, "secondary-listen"),
        }
    }
}

/// Opaque handle to an established link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkHandle {
    pub id: u64,
    pub address: String,
}

/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
}

/// Receiver for inbound notification frames.
///
/// Called from the transport's delivery context, so implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, channel: ListenChannel, data: &[u8]);
}

/// Capability interface over the wireless link.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    /// Scan for advertising peripherals for the given window.
    async fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Establish a link to the peripheral at `address`.
    async fn connect(&self, address: &str) -> Result<LinkHandle, TransportError>;

    /// Tear down a link. Closing an already closed link is not an error.
    async fn disconnect(&self, link: &LinkHandle) -> Result<(), TransportError>;

    /// Whether the link is still alive.
    async fn is_connected(&self, link: &LinkHandle) -> bool;

    /// Write with acknowledgement on a logical channel.
    async fn write(
        &self,
        link: &LinkHandle,
        channel: WriteChannel,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Route notifications from `channel` to `sink` until unsubscribed.
    async fn subscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(
        &self,
        link: &LinkHandle,
        channel: ListenChannel,
    ) -> Result<(), TransportError>;
}
