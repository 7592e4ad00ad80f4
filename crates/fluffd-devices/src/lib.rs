//! Furby device layer.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `ble` | ❌ | btleplug transport for real hardware |
//!
//! ## Architecture
//!
//! - **LinkTransport**: capability interface over the radio (scan, connect, write, notify)
//! - **SimulatedTransport**: in-process peripherals for tests and demo mode
//! - **DeviceConnection**: one link, its writes, notification matching and idle loop
//! - **DeviceRegistry**: live connections keyed by address

pub mod connection;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod transport;

pub use connection::{
    DeviceConnection, NotificationHandler, NotificationWait, IDLE_FRAME, IDLE_INTERVAL,
};
pub use discovery::{discover_furbys, DEFAULT_SCAN_TIMEOUT, FURBY_NAME_MARKER};
pub use error::{DeviceError, Result};
pub use registry::{ConnectOutcome, DeviceRegistry, DeviceSummary};
pub use transport::{
    DiscoveredDevice, LinkHandle, LinkTransport, ListenChannel, NotificationSink, RecordedWrite,
    SimulatedTransport, TransportError, WriteChannel,
};

#[cfg(feature = "ble")]
pub use transport::BtleTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
