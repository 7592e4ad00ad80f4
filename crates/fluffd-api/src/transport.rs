//! Transport selection from configuration.

use std::sync::Arc;

use fluffd_devices::{LinkTransport, SimulatedTransport};

use crate::config::{TransportConfig, TransportKind};

/// Build the configured link transport.
pub async fn build_transport(config: &TransportConfig) -> anyhow::Result<Arc<dyn LinkTransport>> {
    match config.kind {
        TransportKind::Simulated => {
            let sim = SimulatedTransport::new();
            for device in &config.devices {
                sim.add_device(&device.name, &device.address);
                sim.set_auto_ready(&device.address, device.auto_ready);
            }
            tracing::info!(
                devices = config.devices.len(),
                "Using simulated transport"
            );
            Ok(sim)
        }
        TransportKind::Ble => ble_transport().await,
    }
}

#[cfg(feature = "ble")]
async fn ble_transport() -> anyhow::Result<Arc<dyn LinkTransport>> {
    let transport = fluffd_devices::BtleTransport::new().await?;
    tracing::info!("Using Bluetooth LE transport");
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "ble"))]
async fn ble_transport() -> anyhow::Result<Arc<dyn LinkTransport>> {
    anyhow::bail!("Built without Bluetooth support; rebuild with `--features ble` or use the simulated transport")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatedDevice;
    use std::time::Duration;

    #[tokio::test]
    async fn test_simulated_devices_are_registered() {
        let config = TransportConfig {
            kind: TransportKind::Simulated,
            devices: vec![
                SimulatedDevice {
                    name: "Furby".into(),
                    address: "AA:02".into(),
                    auto_ready: true,
                },
                SimulatedDevice {
                    name: "Furby".into(),
                    address: "AA:01".into(),
                    auto_ready: false,
                },
            ],
        };
        let transport = build_transport(&config).await.unwrap();
        let found = transport.scan(Duration::ZERO).await.unwrap();
        let addresses: Vec<_> = found.iter().map(|d| d.address.as_str()).collect();
        assert_eq!(addresses, vec!["AA:01", "AA:02"]);
    }
}
