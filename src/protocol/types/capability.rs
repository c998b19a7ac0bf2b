//! CAPABILITY message type
//!
//! Lists the message types a peer can serve.

use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// CAPABILITY message body
///
/// # Layout
/// - count: u32, big-endian
/// - `count` null-terminated type names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityMessage {
    /// Supported message type names
    pub types: Vec<String>,
}

impl CapabilityMessage {
    /// Create from a list of type names
    pub fn new(types: Vec<String>) -> Self {
        CapabilityMessage { types }
    }

    /// True if `type_name` is listed
    pub fn supports(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }
}

impl Message for CapabilityMessage {
    fn message_type() -> &'static str {
        "CAPABILITY"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let names_len: usize = self.types.iter().map(|t| t.len() + 1).sum();
        let mut buf = Vec::with_capacity(4 + names_len);

        buf.put_u32(self.types.len() as u32);
        for type_name in &self.types {
            buf.extend_from_slice(type_name.as_bytes());
            buf.put_u8(0);
        }
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(IgtlError::InvalidSize {
                expected: 4,
                actual: data.len(),
            });
        }

        let count = data.get_u32() as usize;
        // Each entry takes at least its terminator
        let mut types = Vec::with_capacity(count.min(data.len()));

        for _ in 0..count {
            let end = data.iter().position(|&b| b == 0).ok_or_else(|| {
                IgtlError::InvalidHeader(format!(
                    "Capability list truncated after {} of {} entries",
                    types.len(),
                    count
                ))
            })?;
            types.push(String::from_utf8(data[..end].to_vec())?);
            data.advance(end + 1);
        }

        Ok(CapabilityMessage { types })
    }
}

/// Add CAPABILITY to a factory
pub fn register(factory: &MessageFactory) {
    factory.register_alias("CAPABIL", "CAPABILITY");
    factory.register_message::<CapabilityMessage>();
}
