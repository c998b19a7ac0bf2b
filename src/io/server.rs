//! Listening endpoint producing [`IgtlDevice`]s
//!
//! The provider usually plays the server role: a navigation application
//! connects and sends its `GET_`/`STT_` commands.

use crate::error::Result;
use crate::io::device::{DeviceConfig, IgtlDevice};
use std::net::SocketAddr;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, trace};

/// TCP listener handing out one device per accepted connection
///
/// # Examples
///
/// ```no_run
/// use openigtlink_provider::io::{DeviceConfig, DeviceListener};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let listener = DeviceListener::bind("0.0.0.0:18944", DeviceConfig::default()).await?;
///     let device = listener.accept().await?;
///     println!("peer: {:?}", device.peer_addr());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DeviceListener {
    listener: TcpListener,
    config: DeviceConfig,
}

impl DeviceListener {
    /// Bind to a local address
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: DeviceConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            local_addr = %listener.local_addr()?,
            name = %config.name,
            "OpenIGTLink device listening"
        );
        Ok(DeviceListener { listener, config })
    }

    /// Wait for the next peer
    ///
    /// Each accepted device gets a copy of the listener's [`DeviceConfig`].
    pub async fn accept(&self) -> Result<IgtlDevice> {
        trace!("Waiting for peer connection");
        let (stream, addr) = self.listener.accept().await?;
        info!(peer_addr = %addr, "Peer connected");
        IgtlDevice::from_tcp(stream, self.config.clone())
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Configuration applied to accepted devices
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::raw::RawMessage;
    use std::time::Duration;

    #[tokio::test]
    async fn test_accept_and_exchange() {
        let listener = DeviceListener::bind("127.0.0.1:0", DeviceConfig::default())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let device = IgtlDevice::connect(addr, DeviceConfig::default()).await.unwrap();
            device
                .send_message(&RawMessage::empty("GET_STATUS", "Client"))
                .await
                .unwrap();
            device
        });

        let server_side = listener.accept().await.unwrap();
        assert!(server_side.peer_addr().is_some());

        let command = tokio::time::timeout(Duration::from_secs(5), server_side.recv_command())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(command.type_name(), "GET_STATUS");
        assert_eq!(command.device_name(), "Client");

        client.await.unwrap().close().await;
    }
}
