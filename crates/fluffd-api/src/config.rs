//! Gateway configuration.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. `config.toml` in the working directory, or an explicit `--config` file
//! 3. Environment variables (`FLUFFD_HOST`, `FLUFFD_PORT`, `FLUFFD_TRANSPORT`)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3872;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variable names.
pub mod env_vars {
    pub const HOST: &str = "FLUFFD_HOST";
    pub const PORT: &str = "FLUFFD_PORT";
    pub const TRANSPORT: &str = "FLUFFD_TRANSPORT";
    pub const LOG_JSON: &str = "FLUFFD_LOG_JSON";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// How long the HTTP layer waits on each class of device operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub scan_secs: u64,
    pub connect_secs: u64,
    pub disconnect_secs: u64,
    pub command_secs: u64,
    /// Radio scan window, inside `scan_secs`.
    pub scan_window_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            scan_secs: 10,
            connect_secs: 15,
            disconnect_secs: 10,
            command_secs: 45,
            scan_window_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn scan(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn disconnect(&self) -> Duration {
        Duration::from_secs(self.disconnect_secs)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }
}

/// Which link transport to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Simulated,
    Ble,
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(Self::Simulated),
            "ble" => Ok(Self::Ble),
            other => Err(ConfigError::Invalid(format!("unknown transport '{}'", other))),
        }
    }
}

/// A virtual peripheral for the simulated transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub name: String,
    pub address: String,
    /// Answer DLC prepare frames with the ready marker.
    #[serde(default = "default_true")]
    pub auto_ready: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub devices: Vec<SimulatedDevice>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Simulated,
            devices: vec![SimulatedDevice {
                name: "Furby".to_string(),
                address: "5F:00:00:00:00:01".to_string(),
                auto_ready: true,
            }],
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
    pub transport: TransportConfig,
}

impl GatewayConfig {
    /// Load from `path`, or from `config.toml` if present, then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!(category = "config", "No config file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(category = "config", "Loading config from: {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(env_vars::HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(env_vars::PORT) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{}={}", env_vars::PORT, port)))?;
        }
        if let Some(kind) = lookup(env_vars::TRANSPORT) {
            self.transport.kind = kind.parse()?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "bind address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 3872);
        assert_eq!(config.timeouts.scan(), Duration::from_secs(10));
        assert_eq!(config.timeouts.connect(), Duration::from_secs(15));
        assert_eq!(config.timeouts.disconnect(), Duration::from_secs(10));
        assert_eq!(config.timeouts.command(), Duration::from_secs(45));
        assert_eq!(config.transport.kind, TransportKind::Simulated);
        assert_eq!(config.bind_addr().unwrap().port(), 3872);
    }

    #[test]
    fn test_partial_toml() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [transport]
            kind = "ble"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.transport.kind, TransportKind::Ble);
        assert_eq!(config.timeouts, TimeoutConfig::default());
    }

    #[test]
    fn test_simulated_devices_from_toml() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [[transport.devices]]
            name = "Furby"
            address = "AA:01"

            [[transport.devices]]
            name = "Furby Boom"
            address = "AA:02"
            auto_ready = false
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.devices.len(), 2);
        assert!(config.transport.devices[0].auto_ready);
        assert!(!config.transport.devices[1].auto_ready);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env_vars::HOST, "127.0.0.1"),
            (env_vars::PORT, "9000"),
            (env_vars::TRANSPORT, "BLE"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(config.transport.kind, TransportKind::Ble);
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(|k| (k == env_vars::PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
