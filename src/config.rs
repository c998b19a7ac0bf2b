//! Provider configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! name = "Provider"
//! address = "0.0.0.0:18944"
//! role = "server"
//! stream_interval_ms = 50
//!
//! [device]
//! verify_crc = true
//! recv_buffer_size = 262144
//!
//! [device.command_queue]
//! capacity = 64
//! drop_on_full = true
//! ```

use crate::error::{IgtlError, Result};
use crate::io::device::DeviceConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default OpenIGTLink port
pub const DEFAULT_PORT: u16 = 18944;

/// Which side opens the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Listen for a navigation application
    #[default]
    Server,
    /// Connect out to a peer
    Client,
}

/// Top-level provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Device name stamped on replies that carry none
    pub name: String,
    /// `host:port` to listen on or connect to
    pub address: String,
    /// Server or client side
    pub role: Role,
    /// Period of streamed messages in milliseconds
    pub stream_interval_ms: u64,
    /// Transport settings
    pub device: DeviceConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "IGTLProvider".to_string(),
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            role: Role::Server,
            stream_interval_ms: 100,
            device: DeviceConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// [`IgtlError::Config`] on malformed TOML or a zero stream interval.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ProviderConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use openigtlink_provider::config::ProviderConfig;
    ///
    /// let config = ProviderConfig::load("provider.toml")?;
    /// # Ok::<(), openigtlink_provider::error::IgtlError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Streaming period as a [`Duration`]
    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.stream_interval_ms == 0 {
            return Err(IgtlError::Config(
                "stream_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.device.read_chunk_size == 0 {
            return Err(IgtlError::Config(
                "device.read_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
