//! Data producers the provider can answer requests from

use crate::error::Result;
use crate::protocol::message::Message;
use crate::protocol::raw::RawMessage;
use crate::protocol::types::CapabilityMessage;
use crate::provider::registry::SourceRegistry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A pollable producer of messages of one device type
///
/// The provider calls [`update`](MessageSource::update) before reading
/// [`output`](MessageSource::output) for a `GET_` request, and on every
/// streaming tick.
pub trait MessageSource: Send + Sync {
    /// Human-readable name, published as `igtl.name`
    fn name(&self) -> &str;

    /// Device type this source produces, e.g. `TRANSFORM`
    fn device_type(&self) -> &str;

    /// Refresh the output
    fn update(&self) -> Result<()> {
        Ok(())
    }

    /// Current output, `None` while there is no valid message
    fn output(&self) -> Option<RawMessage>;
}

/// Source whose output is pushed in from outside
///
/// # Examples
///
/// ```
/// use openigtlink_provider::provider::{LatestMessageSource, MessageSource};
/// use openigtlink_provider::protocol::{RawMessage, TransformMessage};
///
/// let source = LatestMessageSource::new("Tracker", "TRANSFORM");
/// assert!(source.output().is_none());
///
/// source.set_output(RawMessage::from_content(&TransformMessage::identity(), "Tool")?);
/// assert_eq!(source.output().unwrap().type_name(), "TRANSFORM");
/// # Ok::<(), openigtlink_provider::error::IgtlError>(())
/// ```
pub struct LatestMessageSource {
    name: String,
    device_type: String,
    latest: Mutex<Option<RawMessage>>,
}

impl LatestMessageSource {
    /// Source without output
    pub fn new(name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            latest: Mutex::new(None),
        }
    }

    /// Source with output built from typed content
    pub fn with_content<T: Message>(name: impl Into<String>, content: &T) -> Result<Self> {
        let name = name.into();
        let msg = RawMessage::from_content(content, &name)?;
        let source = Self::new(name, T::message_type());
        source.set_output(msg);
        Ok(source)
    }

    /// Replace the output
    pub fn set_output(&self, msg: RawMessage) {
        *self.latest.lock() = Some(msg);
    }

    /// Encode `content` and make it the output
    pub fn set_content<T: Message>(&self, content: &T) -> Result<()> {
        self.set_output(RawMessage::from_content(content, &self.name)?);
        Ok(())
    }

    /// Mark the output as not valid
    pub fn invalidate(&self) {
        *self.latest.lock() = None;
    }
}

impl MessageSource for LatestMessageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn output(&self) -> Option<RawMessage> {
        self.latest.lock().clone()
    }
}

impl fmt::Debug for LatestMessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestMessageSource")
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("valid", &self.latest.lock().is_some())
            .finish()
    }
}

type PollFn = Box<dyn Fn() -> Result<Option<RawMessage>> + Send + Sync>;

/// Source that computes its output on every `update`
pub struct PollingSource {
    name: String,
    device_type: String,
    poll: PollFn,
    latest: Mutex<Option<RawMessage>>,
}

impl PollingSource {
    /// `poll` returns the fresh output, or `None` if nothing is valid yet
    pub fn new<F>(name: impl Into<String>, device_type: impl Into<String>, poll: F) -> Self
    where
        F: Fn() -> Result<Option<RawMessage>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            poll: Box::new(poll),
            latest: Mutex::new(None),
        }
    }
}

impl MessageSource for PollingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn update(&self) -> Result<()> {
        let fresh = (self.poll)()?;
        trace!(source = %self.name, valid = fresh.is_some(), "Polled source");
        *self.latest.lock() = fresh;
        Ok(())
    }

    fn output(&self) -> Option<RawMessage> {
        self.latest.lock().clone()
    }
}

impl fmt::Debug for PollingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingSource")
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .finish()
    }
}

/// Answers `GET_CAPABIL` with the device types currently published
pub struct CapabilitySource {
    name: String,
    registry: Arc<SourceRegistry>,
    latest: Mutex<Option<RawMessage>>,
}

impl CapabilitySource {
    /// Describe the sources of `registry`
    pub fn new(name: impl Into<String>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            latest: Mutex::new(None),
        }
    }
}

impl MessageSource for CapabilitySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> &str {
        CapabilityMessage::message_type()
    }

    fn update(&self) -> Result<()> {
        let capability = CapabilityMessage::new(self.registry.device_types());
        *self.latest.lock() = Some(RawMessage::from_content(&capability, &self.name)?);
        Ok(())
    }

    fn output(&self) -> Option<RawMessage> {
        self.latest.lock().clone()
    }
}

impl fmt::Debug for CapabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySource")
            .field("name", &self.name)
            .finish()
    }
}
