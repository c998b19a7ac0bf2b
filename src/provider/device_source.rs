//! Source fed by a device's data queue
//!
//! Lets a provider re-serve what another peer sends: every `update()` drains
//! the device's data queue and remembers the newest message of each type.

use crate::error::{IgtlError, Result};
use crate::io::device::IgtlDevice;
use crate::protocol::raw::RawMessage;
use crate::provider::source::MessageSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// [`MessageSource`] over the inbound data of an [`IgtlDevice`]
///
/// Publishes under one device type; messages of other types are still
/// cached and available through [`DeviceMessageSource::latest`].
pub struct DeviceMessageSource {
    name: String,
    device: Arc<IgtlDevice>,
    device_type: String,
    latest: Mutex<HashMap<String, RawMessage>>,
}

impl DeviceMessageSource {
    /// Serve `device_type` messages received on `device`
    pub fn new(
        name: impl Into<String>,
        device: Arc<IgtlDevice>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            device_type: device_type.into(),
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Newest cached message of `type_name`
    pub fn latest(&self, type_name: &str) -> Option<RawMessage> {
        self.latest.lock().get(type_name).cloned()
    }

    /// Types received so far, sorted
    pub fn types_seen(&self) -> Vec<String> {
        let mut types: Vec<String> = self.latest.lock().keys().cloned().collect();
        types.sort();
        types
    }

    /// Device the source reads from
    pub fn device(&self) -> &Arc<IgtlDevice> {
        &self.device
    }
}

impl MessageSource for DeviceMessageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Drain the data queue
    ///
    /// A closed device is not an error here: the cache keeps the last
    /// messages it saw.
    fn update(&self) -> Result<()> {
        let mut drained = 0usize;
        loop {
            match self.device.next_message() {
                Ok(Some(msg)) => {
                    drained += 1;
                    trace!(msg_type = msg.type_name(), device_name = msg.device_name(), "Cached data message");
                    self.latest.lock().insert(msg.type_name().to_string(), msg);
                }
                Ok(None) => break,
                Err(IgtlError::Disconnected) => {
                    debug!(source = %self.name, "Device closed, serving cached data");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if drained > 0 {
            trace!(source = %self.name, drained, "Drained data queue");
        }
        Ok(())
    }

    fn output(&self) -> Option<RawMessage> {
        self.latest(&self.device_type)
    }
}

impl fmt::Debug for DeviceMessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMessageSource")
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("device", &self.device)
            .finish()
    }
}
