//! Device-level error type.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by connections and the device registry.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Not connected, no address, or the link went away.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport rejected an operation.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Timed out waiting for the device (milliseconds).
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// No registry entry for the identifier.
    #[error("Device not found: {0}")]
    NotFound(String),
}

impl DeviceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
