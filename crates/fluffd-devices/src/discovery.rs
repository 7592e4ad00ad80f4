//! Furby discovery.

use std::time::Duration;

use crate::error::Result;
use crate::transport::{DiscoveredDevice, LinkTransport};

/// Default scan window.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Substring every Furby advertises in its local name.
pub const FURBY_NAME_MARKER: &str = "Furby";

/// Scan for `timeout` and keep only peripherals advertising as a Furby.
pub async fn discover_furbys(
    transport: &dyn LinkTransport,
    timeout: Duration,
) -> Result<Vec<DiscoveredDevice>> {
    tracing::info!(timeout_ms = timeout.as_millis() as u64, "Scanning for Furbys");
    let seen = transport.scan(timeout).await?;

    let furbys: Vec<DiscoveredDevice> = seen
        .into_iter()
        .filter(|device| {
            let is_furby = device.name.contains(FURBY_NAME_MARKER);
            if !is_furby {
                tracing::debug!(address = %device.address, name = %device.name, "Ignoring non-Furby peripheral");
            }
            is_furby
        })
        .collect();

    tracing::info!(count = furbys.len(), "Scan finished");
    Ok(furbys)
}
