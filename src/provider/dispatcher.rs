//! Command dispatch
//!
//! [`MessageProvider`] answers the commands a peer sends over a device:
//!
//! | Command | Fitting source                     | No fitting source        |
//! |---------|------------------------------------|--------------------------|
//! | `GET_X` | `update()`, reply with its output  | `RTS_X` if registered    |
//! | `STT_X` | start streaming `X`                | `RTS_X` if registered    |
//! | `STP_X` | stop streaming `X`                 | `RTS_X` if registered    |
//! | `RTS_X` | ignored                            | `RTS_X` if registered    |
//!
//! Sources are looked up afresh for every command and every streaming tick,
//! never cached, because they come and go while the provider runs.

use crate::config::ProviderConfig;
use crate::error::{IgtlError, Result};
use crate::io::device::IgtlDevice;
use crate::protocol::factory::MessageFactory;
use crate::protocol::raw::RawMessage;
use crate::protocol::request::{strip_request_prefix, RequestKind};
use crate::provider::registry::SourceRegistry;
use crate::provider::source::MessageSource;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What the provider decided for one command
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Send this message back
    Reply(RawMessage),
    /// Streaming of the canonical type began
    StreamStarted(String),
    /// Streaming of the canonical type ended
    StreamStopped(String),
    /// A source exists but has no valid output
    NoOutput,
    /// No source and no `RTS_` type to say so
    Unsupported,
    /// Nothing to do for this command
    Ignored,
}

impl Dispatch {
    /// The reply to send, if any
    pub fn into_reply(self) -> Option<RawMessage> {
        match self {
            Dispatch::Reply(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Answers `GET_`/`STT_`/`STP_` commands from a [`SourceRegistry`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use openigtlink_provider::protocol::{MessageFactory, RawMessage, TransformMessage};
/// use openigtlink_provider::provider::{Dispatch, LatestMessageSource, MessageProvider, SourceRegistry};
///
/// let registry = Arc::new(SourceRegistry::new());
/// let factory = Arc::new(MessageFactory::with_standard_types());
/// let provider = MessageProvider::new(Arc::clone(&registry), factory);
///
/// let tracker = Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity())?);
/// let _registration = registry.publish(&tracker);
///
/// let reply = provider.dispatch(&RawMessage::empty("GET_TRANS", "Navigation"));
/// assert!(matches!(reply, Dispatch::Reply(ref msg) if msg.type_name() == "TRANSFORM"));
///
/// let reply = provider.dispatch(&RawMessage::empty("GET_STATUS", "Navigation"));
/// assert!(matches!(reply, Dispatch::Reply(ref msg) if msg.type_name() == "RTS_STATUS"));
/// # Ok::<(), openigtlink_provider::error::IgtlError>(())
/// ```
pub struct MessageProvider {
    name: String,
    registry: Arc<SourceRegistry>,
    factory: Arc<MessageFactory>,
    streams: Mutex<BTreeSet<String>>,
    stream_interval: Duration,
}

impl MessageProvider {
    /// Provider with default name and a 100 ms streaming period
    pub fn new(registry: Arc<SourceRegistry>, factory: Arc<MessageFactory>) -> Self {
        Self::from_config(&ProviderConfig::default(), registry, factory)
    }

    /// Provider named and paced by `config`
    pub fn from_config(
        config: &ProviderConfig,
        registry: Arc<SourceRegistry>,
        factory: Arc<MessageFactory>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            registry,
            factory,
            streams: Mutex::new(BTreeSet::new()),
            stream_interval: config.stream_interval(),
        }
    }

    /// Name stamped on `RTS_` replies
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Period of streamed messages; zero is raised to one millisecond
    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry the provider answers from
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Factory used for `RTS_` replies
    pub fn factory(&self) -> &Arc<MessageFactory> {
        &self.factory
    }

    /// Decide what to do with one command
    ///
    /// Never blocks on I/O; the caller sends the reply.
    pub fn dispatch(&self, command: &RawMessage) -> Dispatch {
        let type_name = command.type_name();
        let kind = RequestKind::classify(type_name);

        let bare = strip_request_prefix(type_name);
        if bare.is_empty() {
            debug!(msg_type = type_name, "Command without a type name");
            return Dispatch::Unsupported;
        }
        let canonical = self.factory.canonical_type_name(bare);

        let Some(source) = self.fitting_source(&canonical, bare) else {
            return self.not_available(type_name, bare);
        };

        debug!(
            msg_type = type_name,
            device_name = command.device_name(),
            source = source.name(),
            "Dispatching command"
        );

        match kind {
            RequestKind::Get => {
                if let Err(e) = source.update() {
                    warn!(source = source.name(), error = %e, "Source update failed");
                }
                match source.output() {
                    Some(msg) => Dispatch::Reply(msg),
                    None => {
                        debug!(source = source.name(), "Source has no valid output, not replying");
                        Dispatch::NoOutput
                    }
                }
            }
            RequestKind::Start => {
                if self.streams.lock().insert(canonical.clone()) {
                    info!(device_type = %canonical, "Streaming started");
                }
                Dispatch::StreamStarted(canonical)
            }
            RequestKind::Stop => {
                if self.streams.lock().remove(&canonical) {
                    info!(device_type = %canonical, "Streaming stopped");
                }
                Dispatch::StreamStopped(canonical)
            }
            RequestKind::Rts | RequestKind::Unknown => Dispatch::Ignored,
        }
    }

    /// Device types currently streamed, sorted
    pub fn active_streams(&self) -> Vec<String> {
        self.streams.lock().iter().cloned().collect()
    }

    /// True if `device_type` (any alias) is streamed
    pub fn is_streaming(&self, device_type: &str) -> bool {
        let canonical = self.factory.canonical_type_name(device_type);
        self.streams.lock().contains(&canonical)
    }

    /// True if any type is streamed
    pub fn has_streams(&self) -> bool {
        !self.streams.lock().is_empty()
    }

    /// Fresh outputs of every streamed type
    ///
    /// Types whose source disappeared stay active and resume when a source
    /// is published again.
    pub fn stream_outputs(&self) -> Vec<RawMessage> {
        let types = self.streams.lock().clone();
        types
            .iter()
            .filter_map(|device_type| {
                let source = self.registry.find_by_device_type(device_type)?;
                if let Err(e) = source.update() {
                    warn!(source = source.name(), error = %e, "Source update failed");
                }
                source.output()
            })
            .collect()
    }

    /// Dispatch the next queued command of `device`, if any
    ///
    /// Returns `Ok(None)` when no command is waiting. A reply is sent before
    /// returning.
    pub async fn handle_next_command(&self, device: &IgtlDevice) -> Result<Option<Dispatch>> {
        let Some(command) = device.next_command()? else {
            return Ok(None);
        };
        let dispatch = self.dispatch(&command);
        if let Dispatch::Reply(msg) = &dispatch {
            device.send_message(msg).await?;
        }
        Ok(Some(dispatch))
    }

    /// Answer commands and push streams until `device` disconnects
    ///
    /// Send failures other than a disconnect are logged and the loop goes on.
    pub async fn serve(&self, device: &IgtlDevice) -> Result<()> {
        let mut ticker = tokio::time::interval(self.stream_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(provider = %self.name, device = device.name(), "Serving commands");

        loop {
            tokio::select! {
                command = device.recv_command() => {
                    let command = match command {
                        Ok(command) => command,
                        Err(IgtlError::Disconnected) => break,
                        Err(e) => return Err(e),
                    };
                    if let Dispatch::Reply(msg) = self.dispatch(&command) {
                        if !deliver(device, &msg).await {
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if self.has_streams() => {
                    for msg in self.stream_outputs() {
                        if !deliver(device, &msg).await {
                            return Ok(());
                        }
                    }
                }
            }
        }

        info!(provider = %self.name, "Device gone, stopped serving");
        Ok(())
    }

    /// Source for the canonical name, else for the name as requested
    fn fitting_source(&self, canonical: &str, bare: &str) -> Option<Arc<dyn MessageSource>> {
        if let Some(source) = self.registry.find_by_device_type(canonical) {
            return Some(source);
        }
        if canonical == bare {
            return None;
        }
        self.registry.find_by_device_type(bare)
    }

    /// `RTS_<bare>` reply from the factory, or `Unsupported`
    ///
    /// The reply carries the type name the factory registered, so
    /// `GET_TRANSFORM` is answered with `RTS_TRANS`.
    fn not_available(&self, type_name: &str, bare: &str) -> Dispatch {
        let Some(rts_name) = RequestKind::Rts.type_name_for(bare) else {
            return Dispatch::Unsupported;
        };
        match self.factory.create(&rts_name) {
            Ok(mut reply) => {
                debug!(msg_type = type_name, reply = reply.type_name(), "No source, replying RTS");
                reply.set_device_name(self.name.as_str());
                Dispatch::Reply(reply)
            }
            Err(IgtlError::UnknownMessageType(_)) => {
                debug!(msg_type = type_name, "No source and no RTS type, dropping command");
                Dispatch::Unsupported
            }
            Err(e) => {
                warn!(msg_type = %rts_name, error = %e, "RTS constructor failed");
                Dispatch::Unsupported
            }
        }
    }
}

impl fmt::Debug for MessageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProvider")
            .field("name", &self.name)
            .field("streams", &*self.streams.lock())
            .field("stream_interval", &self.stream_interval)
            .finish()
    }
}

/// False once the device is gone
async fn deliver(device: &IgtlDevice, msg: &RawMessage) -> bool {
    match device.send_message(msg).await {
        Ok(()) => true,
        Err(IgtlError::Disconnected) => false,
        Err(e) => {
            warn!(msg_type = msg.type_name(), error = %e, "Reply not sent");
            device.is_connected()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{
        RtsStatusMessage, StatusMessage, TransformMessage, RTS_NOT_AVAILABLE,
    };
    use crate::provider::source::LatestMessageSource;

    fn provider() -> (Arc<SourceRegistry>, MessageProvider) {
        let registry = Arc::new(SourceRegistry::new());
        let factory = Arc::new(MessageFactory::with_standard_types());
        let provider = MessageProvider::new(Arc::clone(&registry), factory).with_name("Provider");
        (registry, provider)
    }

    fn command(type_name: &str) -> RawMessage {
        RawMessage::empty(type_name, "Navigation")
    }

    #[test]
    fn test_get_replies_with_source_output() {
        let (registry, provider) = provider();
        let tracker =
            Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity()).unwrap());
        let _reg = registry.publish(&tracker);

        for name in ["GET_TRANSFORM", "GET_TRANS", "GET_TRANSFOR"] {
            let reply = provider.dispatch(&command(name)).into_reply().unwrap();
            assert_eq!(reply.type_name(), "TRANSFORM", "{name}");
            assert_eq!(reply.device_name(), "Tool");
            assert_eq!(reply, tracker.output().unwrap());
        }
    }

    #[test]
    fn test_missing_source_replies_rts() {
        let (_registry, provider) = provider();

        let reply = provider.dispatch(&command("GET_STATUS")).into_reply().unwrap();
        assert_eq!(reply.type_name(), "RTS_STATUS");
        assert_eq!(reply.device_name(), "Provider");
        let rts = reply.decode::<RtsStatusMessage>().unwrap();
        assert_eq!(rts.content.status, RTS_NOT_AVAILABLE);

        let reply = provider.dispatch(&command("GET_TRANSFORM")).into_reply().unwrap();
        assert_eq!(reply.type_name(), "RTS_TRANS");
    }

    #[test]
    fn test_unknown_type_is_silent() {
        let (_registry, provider) = provider();
        assert_eq!(provider.dispatch(&command("GET_FOO")), Dispatch::Unsupported);
        assert_eq!(provider.dispatch(&command("XYZ_THING")), Dispatch::Unsupported);
        assert_eq!(provider.dispatch(&command("GET_")), Dispatch::Unsupported);
        assert_eq!(provider.dispatch(&command("GE")), Dispatch::Unsupported);
    }

    #[test]
    fn test_unknown_prefix_with_source_does_nothing() {
        let (registry, provider) = provider();
        let status =
            Arc::new(LatestMessageSource::with_content("Robot", &StatusMessage::ok("idle")).unwrap());
        let _reg = registry.publish(&status);

        assert_eq!(provider.dispatch(&command("XYZ_STATUS")), Dispatch::Ignored);
    }

    #[test]
    fn test_invalid_output_is_not_answered() {
        let (registry, provider) = provider();
        let status = Arc::new(LatestMessageSource::new("Robot", "STATUS"));
        let _reg = registry.publish(&status);

        assert_eq!(provider.dispatch(&command("GET_STATUS")), Dispatch::NoOutput);
    }

    #[test]
    fn test_inbound_rts_without_source_echoes_rts() {
        let (_registry, provider) = provider();

        let reply = provider.dispatch(&command("RTS_STATUS")).into_reply().unwrap();
        assert_eq!(reply.type_name(), "RTS_STATUS");
        assert_eq!(reply.device_name(), "Provider");
        assert_eq!(provider.dispatch(&command("RTS_FOO")), Dispatch::Unsupported);
    }

    #[test]
    fn test_inbound_rts_with_source_does_nothing() {
        let (registry, provider) = provider();
        let status =
            Arc::new(LatestMessageSource::with_content("Robot", &StatusMessage::ok("idle")).unwrap());
        let _reg = registry.publish(&status);

        assert_eq!(provider.dispatch(&command("RTS_STATUS")), Dispatch::Ignored);
        assert!(!provider.has_streams());
    }

    #[test]
    fn test_start_and_stop_toggle_streams() {
        let (registry, provider) = provider();
        let tracker =
            Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity()).unwrap());
        let _reg = registry.publish(&tracker);

        assert_eq!(
            provider.dispatch(&command("STT_TRANS")),
            Dispatch::StreamStarted("TRANSFORM".to_string())
        );
        assert!(provider.is_streaming("TRANS"));
        assert_eq!(provider.active_streams(), vec!["TRANSFORM"]);
        assert_eq!(provider.stream_outputs().len(), 1);

        assert_eq!(
            provider.dispatch(&command("STP_TRANSFORM")),
            Dispatch::StreamStopped("TRANSFORM".to_string())
        );
        assert!(!provider.has_streams());
        assert!(provider.stream_outputs().is_empty());
    }

    #[test]
    fn test_start_without_source_replies_rts() {
        let (_registry, provider) = provider();
        let reply = provider.dispatch(&command("STT_TDATA")).into_reply().unwrap();
        assert_eq!(reply.type_name(), "RTS_TDATA");
        assert!(!provider.has_streams());
    }

    #[test]
    fn test_stream_resumes_after_source_returns() {
        let (registry, provider) = provider();
        let tracker =
            Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity()).unwrap());
        let registration = registry.publish(&tracker);
        provider.dispatch(&command("STT_TRANS"));

        drop(registration);
        assert!(provider.stream_outputs().is_empty());
        assert!(provider.is_streaming("TRANSFORM"));

        let _again = registry.publish(&tracker);
        assert_eq!(provider.stream_outputs().len(), 1);
    }

    #[test]
    fn test_custom_rts_type() {
        let (_registry, provider) = provider();
        provider
            .factory()
            .register_type("RTS_FOO", || Ok(RawMessage::new("RTS_FOO", "", vec![0u8, 1])));

        let reply = provider.dispatch(&command("GET_FOO")).into_reply().unwrap();
        assert_eq!(reply.type_name(), "RTS_FOO");
    }
}
