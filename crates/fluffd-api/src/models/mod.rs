//! Request and response bodies.

pub mod error;

use fluffd_commands::Params;
use fluffd_devices::DeviceSummary;
use serde::{Deserialize, Serialize};

pub use error::{ApiResult, ErrorResponse};

/// `{"status": "ok", "message": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: message.into(),
        }
    }
}

/// Addresses found by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub message: String,
    pub devices: Vec<String>,
}

/// Body of `POST /cmd/<command>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandRequest {
    pub params: Params,
    pub target: Option<String>,
}

impl CommandRequest {
    /// The addressed device, with an empty string meaning broadcast.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceListResponse {
    pub status: &'static str,
    pub devices: Vec<DeviceSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_request_defaults() {
        let req: CommandRequest = serde_json::from_str("{}").unwrap();
        assert!(req.params.is_empty());
        assert_eq!(req.target(), None);

        let req: CommandRequest =
            serde_json::from_str(r#"{"params": {"red": 255}, "target": ""}"#).unwrap();
        assert_eq!(req.params.int_or("red", 0).unwrap(), 255);
        assert_eq!(req.target(), None);

        let req: CommandRequest = serde_json::from_str(r#"{"target": "AA:01"}"#).unwrap();
        assert_eq!(req.target(), Some("AA:01"));
    }
}
