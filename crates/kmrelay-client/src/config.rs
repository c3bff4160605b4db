//! TOML configuration for the demo binary.
//!
//! Example `kmrelay.toml`:
//!
//! ```toml
//! address = "192.168.2.188"
//! control_port = 16896
//! log_level = "debug"
//! ```
//!
//! Every field has a default, so a partial file (or none at all) works.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The device address is not a valid IP address.
    #[error("invalid device address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Connection settings for one relay box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// IP address of the box on the LAN.
    #[serde(default = "default_address")]
    pub address: String,
    /// The box's UDP control port; reports arrive on this port plus one.
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    "192.168.2.188".to_string()
}

fn default_control_port() -> u16 {
    16896
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            control_port: default_control_port(),
            log_level: default_log_level(),
        }
    }
}

impl DeviceConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// The device's control socket address.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Address`] if `address` does not parse as an IP.
    pub fn device_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.address.parse().map_err(|source| ConfigError::Address {
            address: self.address.clone(),
            source,
        })?;
        Ok(SocketAddr::new(ip, self.control_port))
    }
}
