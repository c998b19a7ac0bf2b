//! Transport device: one OpenIGTLink connection with a background receive loop
//!
//! The receive task turns the inbound byte stream into frames and routes
//! each frame to exactly one of two FIFO queues: commands (`GET_`, `STT_`,
//! `STP_`, `RTS_` types) or data (everything else). Consumers poll or await
//! those queues; sending happens on the caller's task.

use crate::error::{IgtlError, Result};
use crate::io::message_queue::{MessageQueue, QueueConfig, QueueStats};
use crate::protocol::frame::{FrameDecoder, FrameOptions, FrameStats, DEFAULT_MAX_BODY_SIZE};
use crate::protocol::message::{IgtlMessage, Message};
use crate::protocol::raw::RawMessage;
use crate::protocol::request::RequestKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Connection settings of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name written into outgoing headers that carry no device name
    pub name: String,
    /// Check inbound bodies against their CRC
    pub verify_crc: bool,
    /// Largest inbound body accepted; bigger frames are treated as corrupt
    pub max_body_size: u64,
    /// Bytes requested per socket read
    pub read_chunk_size: usize,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
    /// SO_RCVBUF, left to the OS when unset
    pub recv_buffer_size: Option<usize>,
    /// SO_SNDBUF, left to the OS when unset
    pub send_buffer_size: Option<usize>,
    /// Queue for data messages
    pub data_queue: QueueConfig,
    /// Queue for command messages
    pub command_queue: QueueConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "IGTLDevice".to_string(),
            verify_crc: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_chunk_size: 64 * 1024,
            nodelay: true,
            recv_buffer_size: None,
            send_buffer_size: None,
            data_queue: QueueConfig::default(),
            command_queue: QueueConfig::default(),
        }
    }
}

impl DeviceConfig {
    fn frame_options(&self) -> FrameOptions {
        FrameOptions {
            verify_crc: self.verify_crc,
            max_body_size: self.max_body_size,
        }
    }
}

/// State shared between the device handle and its receive task
struct Shared {
    name: String,
    data_queue: MessageQueue<RawMessage>,
    command_queue: MessageQueue<RawMessage>,
    connected: AtomicBool,
    frame_stats: Mutex<FrameStats>,
}

impl Shared {
    fn route(&self, msg: RawMessage) {
        let is_command = RequestKind::is_command(msg.type_name());
        let queue = if is_command {
            &self.command_queue
        } else {
            &self.data_queue
        };

        trace!(
            msg_type = msg.type_name(),
            device_name = msg.device_name(),
            command = is_command,
            "Routing received message"
        );

        if let Err(e) = queue.enqueue(msg) {
            warn!(error = %e, command = is_command, "Dropping received message");
        }
    }

    /// Idempotent
    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(device = %self.name, "Device disconnected");
        }
        self.data_queue.close();
        self.command_queue.close();
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One OpenIGTLink connection
///
/// # Examples
///
/// ```no_run
/// use openigtlink_provider::io::{DeviceConfig, IgtlDevice};
/// use openigtlink_provider::protocol::{RawMessage, StatusMessage};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let device = IgtlDevice::connect("127.0.0.1:18944", DeviceConfig::default()).await?;
///     device.send_message(&RawMessage::empty("GET_STATUS", "Client")).await?;
///
///     let reply = device.recv_message().await?;
///     let status = reply.decode::<StatusMessage>()?;
///     println!("{}", status.content.status_string);
///     Ok(())
/// }
/// ```
pub struct IgtlDevice {
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<BoxedWriter>,
    shutdown: watch::Sender<bool>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    peer_addr: Option<SocketAddr>,
}

impl IgtlDevice {
    /// Connect to a remote peer
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: DeviceConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        info!(
            peer_addr = ?stream.peer_addr().ok(),
            name = %config.name,
            "Connected to OpenIGTLink peer"
        );
        Self::from_tcp(stream, config)
    }

    /// Take over an established TCP stream
    ///
    /// Applies the socket options of `config` and spawns the receive task,
    /// so it must be called from within a Tokio runtime.
    pub fn from_tcp(stream: TcpStream, config: DeviceConfig) -> Result<Self> {
        stream.set_nodelay(config.nodelay)?;
        if let Some(size) = config.recv_buffer_size {
            set_socket_buffer(&stream, SocketBuffer::Receive, size)?;
        }
        if let Some(size) = config.send_buffer_size {
            set_socket_buffer(&stream, SocketBuffer::Send, size)?;
        }

        let peer_addr = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        let mut device = Self::from_split(reader, writer, config);
        device.peer_addr = peer_addr;
        Ok(device)
    }

    /// Run a device over any duplex byte stream
    pub fn from_io<T>(io: T, config: DeviceConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_split(reader, writer, config)
    }

    /// Run a device over separate read and write halves
    pub fn from_split<R, W>(reader: R, writer: W, config: DeviceConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            data_queue: MessageQueue::with_config(config.data_queue),
            command_queue: MessageQueue::with_config(config.command_queue),
            connected: AtomicBool::new(true),
            frame_stats: Mutex::new(FrameStats::default()),
        });

        if !config.verify_crc {
            warn!("CRC verification disabled - use only in trusted environments");
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&shared),
            shutdown_rx,
            config.frame_options(),
            config.read_chunk_size.max(1),
        ));

        IgtlDevice {
            shared,
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            shutdown,
            receive_task: Mutex::new(Some(task)),
            peer_addr: None,
        }
    }

    /// Name used for outgoing messages without a device name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Remote address for TCP devices
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// False once the peer went away or [`IgtlDevice::close`] was called
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Next data message, without waiting
    ///
    /// `Ok(None)` when nothing is queued; [`IgtlError::Disconnected`] once
    /// the device is closed and the queue drained.
    pub fn next_message(&self) -> Result<Option<RawMessage>> {
        self.shared.data_queue.try_dequeue()
    }

    /// Next command message, without waiting
    pub fn next_command(&self) -> Result<Option<RawMessage>> {
        self.shared.command_queue.try_dequeue()
    }

    /// Wait for the next data message
    pub async fn recv_message(&self) -> Result<RawMessage> {
        self.shared.data_queue.dequeue().await
    }

    /// Wait for the next command message
    pub async fn recv_command(&self) -> Result<RawMessage> {
        self.shared.command_queue.dequeue().await
    }

    /// Send a message
    ///
    /// A message without a device name goes out under this device's name.
    /// Encoding happens before the writer lock is taken.
    ///
    /// # Errors
    ///
    /// - [`IgtlError::Disconnected`] - the device is closed, before or
    ///   during the write
    /// - [`IgtlError::InvalidHeader`] - a name does not fit its header field
    /// - [`IgtlError::Io`] - the write failed
    pub async fn send_message(&self, msg: &RawMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(IgtlError::Disconnected);
        }

        let data = if msg.device_name().is_empty() {
            let mut named = msg.clone();
            named.set_device_name(self.shared.name.as_str());
            named.encode()?
        } else {
            msg.encode()?
        };

        debug!(
            msg_type = msg.type_name(),
            device_name = msg.device_name(),
            size = data.len(),
            "Sending message"
        );

        // close() cancels a write stuck on a peer that stopped reading
        let mut shutdown = self.shutdown.subscribe();
        let written = tokio::select! {
            written = async {
                let mut writer = self.writer.lock().await;
                write_frame(&mut writer, &data).await
            } => written,
            _ = shutdown.wait_for(|closed| *closed) => {
                debug!(msg_type = msg.type_name(), "Send cancelled by close");
                return Err(IgtlError::Disconnected);
            }
        };
        if let Err(e) = written {
            warn!(error = %e, msg_type = msg.type_name(), "Send failed");
            return Err(e);
        }

        trace!(msg_type = msg.type_name(), bytes_sent = data.len(), "Message sent");
        Ok(())
    }

    /// Send a typed message
    pub async fn send<T: Message>(&self, msg: &IgtlMessage<T>) -> Result<()> {
        self.send_message(&RawMessage::from_message(msg)?).await
    }

    /// Close the connection
    ///
    /// Stops the receive task and closes both queues. Sends in progress
    /// fail with [`IgtlError::Disconnected`]. Messages already queued can
    /// still be taken. Calling this twice is harmless.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        self.shared.disconnect();

        let _ = self.writer.lock().await.shutdown().await;

        let task = self.receive_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Receive task ended abnormally");
            }
        }
    }

    /// Framing counters of the receive loop
    pub fn frame_stats(&self) -> FrameStats {
        *self.shared.frame_stats.lock()
    }

    /// Data queue counters
    pub fn data_queue_stats(&self) -> QueueStats {
        self.shared.data_queue.stats()
    }

    /// Command queue counters
    pub fn command_queue_stats(&self) -> QueueStats {
        self.shared.command_queue.stats()
    }
}

impl Drop for IgtlDevice {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for IgtlDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgtlDevice")
            .field("name", &self.shared.name)
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn write_frame(writer: &mut BoxedWriter, data: &[u8]) -> Result<()> {
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

async fn receive_loop<R>(
    mut reader: R,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    options: FrameOptions,
    chunk_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(options);
    let mut buf = vec![0u8; chunk_size];

    debug!(device = %shared.name, "Receive loop started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(device = %shared.name, "Receive loop stopping on request");
                    break;
                }
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!(device = %shared.name, "Peer closed connection");
                    break;
                }
                Ok(n) => {
                    trace!(bytes = n, "Received bytes");
                    decoder.extend_from_slice(&buf[..n]);
                    while let Some(msg) = decoder.next_frame() {
                        shared.route(msg);
                    }
                    *shared.frame_stats.lock() = decoder.stats();
                }
                Err(e) => {
                    warn!(device = %shared.name, error = %e, "Read failed");
                    break;
                }
            }
        }
    }

    if decoder.buffered() > 0 {
        debug!(bytes = decoder.buffered(), "Discarding partial frame at end of stream");
    }
    shared.disconnect();
}

#[derive(Debug, Clone, Copy)]
enum SocketBuffer {
    Receive,
    Send,
}

#[cfg(unix)]
fn set_socket_buffer(stream: &TcpStream, which: SocketBuffer, size: usize) -> Result<()> {
    use std::os::fd::AsRawFd;

    let option = match which {
        SocketBuffer::Receive => libc::SO_RCVBUF,
        SocketBuffer::Send => libc::SO_SNDBUF,
    };
    let size = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);

    // SAFETY: the fd is owned by `stream` for the duration of the call and
    // `size` outlives it.
    let ret = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    debug!(option = ?which, size, "Socket buffer size set");
    Ok(())
}

#[cfg(not(unix))]
fn set_socket_buffer(_stream: &TcpStream, which: SocketBuffer, size: usize) -> Result<()> {
    warn!(option = ?which, size, "Socket buffer sizing not supported on this platform");
    Ok(())
}
