//! Type-state builder for devices
//!
//! The endpoint must be chosen before the role, and only a client can
//! `connect()` while only a server can `listen()`. Misuse is a compile error.
//!
//! # Type-State Pattern
//!
//! - Endpoint state: `Unspecified` -> `TcpConfigured`
//! - Role state: `Unspecified` -> `ClientRole` or `ServerRole`
//!
//! # Examples
//!
//! ```no_run
//! use openigtlink_provider::io::builder::DeviceBuilder;
//!
//! # async fn example() -> Result<(), openigtlink_provider::error::IgtlError> {
//! let device = DeviceBuilder::new()
//!     .tcp("127.0.0.1:18944")
//!     .client()
//!     .name("Navigation")
//!     .connect()
//!     .await?;
//!
//! let listener = DeviceBuilder::new()
//!     .tcp("0.0.0.0:18944")
//!     .server()
//!     .verify_crc(false)
//!     .listen()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{IgtlError, Result};
use crate::io::device::{DeviceConfig, IgtlDevice};
use crate::io::message_queue::QueueConfig;
use crate::io::server::DeviceListener;
use std::marker::PhantomData;

/// Nothing chosen yet
pub struct Unspecified;

/// TCP endpoint chosen
pub struct TcpConfigured {
    pub(crate) addr: String,
}

/// Connects to a remote peer
pub struct ClientRole;

/// Listens for peers
pub struct ServerRole;

/// Type-state builder for [`IgtlDevice`] and [`DeviceListener`]
///
/// # Type Parameters
/// * `Endpoint` - `Unspecified` or `TcpConfigured`
/// * `Role` - `Unspecified`, `ClientRole` or `ServerRole`
pub struct DeviceBuilder<Endpoint = Unspecified, Role = Unspecified> {
    endpoint: Endpoint,
    role: PhantomData<Role>,
    config: DeviceConfig,
}

impl DeviceBuilder<Unspecified, Unspecified> {
    /// Start a builder with the default [`DeviceConfig`]
    pub fn new() -> Self {
        Self {
            endpoint: Unspecified,
            role: PhantomData,
            config: DeviceConfig::default(),
        }
    }

    /// Use a TCP endpoint (`host:port`)
    pub fn tcp(self, addr: impl Into<String>) -> DeviceBuilder<TcpConfigured, Unspecified> {
        DeviceBuilder {
            endpoint: TcpConfigured { addr: addr.into() },
            role: PhantomData,
            config: self.config,
        }
    }
}

impl Default for DeviceBuilder<Unspecified, Unspecified> {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBuilder<TcpConfigured, Unspecified> {
    /// Connect out to the endpoint
    pub fn client(self) -> DeviceBuilder<TcpConfigured, ClientRole> {
        DeviceBuilder {
            endpoint: self.endpoint,
            role: PhantomData,
            config: self.config,
        }
    }

    /// Listen on the endpoint
    pub fn server(self) -> DeviceBuilder<TcpConfigured, ServerRole> {
        DeviceBuilder {
            endpoint: self.endpoint,
            role: PhantomData,
            config: self.config,
        }
    }
}

impl DeviceBuilder<TcpConfigured, ClientRole> {
    /// Connect and start the receive loop
    ///
    /// # Errors
    ///
    /// - [`IgtlError::Config`] - malformed address
    /// - [`IgtlError::Io`] - connection failed
    pub async fn connect(self) -> Result<IgtlDevice> {
        let (host, port) = parse_addr(&self.endpoint.addr)?;
        IgtlDevice::connect((host.as_str(), port), self.config).await
    }
}

impl DeviceBuilder<TcpConfigured, ServerRole> {
    /// Bind the listening socket
    pub async fn listen(self) -> Result<DeviceListener> {
        let (host, port) = parse_addr(&self.endpoint.addr)?;
        DeviceListener::bind((host.as_str(), port), self.config).await
    }
}

impl<Endpoint, Role> DeviceBuilder<Endpoint, Role> {
    /// Name used for outgoing messages without a device name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Enable or disable CRC verification of inbound frames
    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.config.verify_crc = verify;
        self
    }

    /// Largest inbound body accepted
    pub fn max_body_size(mut self, size: u64) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Capacity policy of both queues
    pub fn queues(mut self, config: QueueConfig) -> Self {
        self.config.data_queue = config;
        self.config.command_queue = config;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration built so far
    pub fn device_config(&self) -> &DeviceConfig {
        &self.config
    }
}

/// Split `host:port`
fn parse_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| IgtlError::Config(format!("Invalid address format: {}", addr)))?;

    let port = port
        .parse::<u16>()
        .map_err(|e| IgtlError::Config(format!("Invalid port number in {}: {}", addr, e)))?;

    if host.is_empty() {
        return Err(IgtlError::Config(format!("Missing host in {}", addr)));
    }

    Ok((host.to_string(), port))
}
