//! STRING message type

use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// MIBenum of US-ASCII
pub const ENCODING_US_ASCII: u16 = 3;
/// MIBenum of UTF-8
pub const ENCODING_UTF8: u16 = 106;

/// STRING message body
///
/// # Layout (big-endian)
/// - encoding: u16 (IANA MIBenum)
/// - length: u16
/// - `length` bytes of text, no terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMessage {
    /// Character set as MIBenum
    pub encoding: u16,
    /// Text content
    pub string: String,
}

impl StringMessage {
    /// US-ASCII string
    pub fn new(string: impl Into<String>) -> Self {
        StringMessage {
            encoding: ENCODING_US_ASCII,
            string: string.into(),
        }
    }

    /// UTF-8 string
    pub fn utf8(string: impl Into<String>) -> Self {
        StringMessage {
            encoding: ENCODING_UTF8,
            string: string.into(),
        }
    }

    /// Text content
    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Default for StringMessage {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for StringMessage {
    fn from(s: &str) -> Self {
        StringMessage::new(s)
    }
}

impl Message for StringMessage {
    fn message_type() -> &'static str {
        "STRING"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let text = self.string.as_bytes();
        let length = u16::try_from(text.len()).map_err(|_| IgtlError::BodyTooLarge {
            size: text.len(),
            max: u16::MAX as usize,
        })?;

        let mut buf = Vec::with_capacity(4 + text.len());
        buf.put_u16(self.encoding);
        buf.put_u16(length);
        buf.extend_from_slice(text);
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(IgtlError::InvalidSize {
                expected: 4,
                actual: data.len(),
            });
        }

        let encoding = data.get_u16();
        let length = data.get_u16() as usize;
        if data.len() < length {
            return Err(IgtlError::InvalidSize {
                expected: length,
                actual: data.len(),
            });
        }

        Ok(StringMessage {
            encoding,
            string: String::from_utf8(data[..length].to_vec())?,
        })
    }
}

/// Add STRING to a factory
pub fn register(factory: &MessageFactory) {
    factory.register_message::<StringMessage>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let encoded = StringMessage::new("Test").encode_content().unwrap();
        assert_eq!(&encoded[..4], &[0, 3, 0, 4]);
        assert_eq!(&encoded[4..], b"Test");
    }

    #[test]
    fn test_utf8_roundtrip() {
        let original = StringMessage::utf8("Nadel 3 → Ziel");
        let decoded = StringMessage::decode_content(&original.encode_content().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_length_limit() {
        assert!(StringMessage::new("A".repeat(65535)).encode_content().is_ok());
        assert!(matches!(
            StringMessage::new("A".repeat(65536)).encode_content(),
            Err(IgtlError::BodyTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        let mut data = vec![0, 3, 0, 10];
        data.extend_from_slice(b"short");
        assert!(matches!(
            StringMessage::decode_content(&data),
            Err(IgtlError::InvalidSize { expected: 10, actual: 5 })
        ));
    }
}
