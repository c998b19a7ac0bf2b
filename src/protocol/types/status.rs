//! STATUS message type
//!
//! Notifies the receiver about the sender's state: a status code, a
//! device-specific subcode, a short error name and a free-form text.

use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Width of the error name field
const ERROR_NAME_LEN: usize = 20;
/// code (2) + subcode (8) + error name (20) + terminator (1)
const MIN_BODY_SIZE: usize = 2 + 8 + ERROR_NAME_LEN + 1;

/// Status codes defined by OpenIGTLink
pub mod code {
    /// Invalid packet
    pub const INVALID: u16 = 0;
    /// No error
    pub const OK: u16 = 1;
    /// Unknown error
    pub const UNKNOWN_ERROR: u16 = 2;
    /// Not ready
    pub const NOT_READY: u16 = 13;
    /// Device is busy
    pub const BUSY: u16 = 15;
}

/// STATUS message body
///
/// # Layout (big-endian)
/// - code: u16
/// - subcode: i64
/// - error name: char[20], null-padded
/// - status string: null-terminated
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    /// Status code, see [`code`]
    pub code: u16,
    /// Device-specific sub-code
    pub subcode: i64,
    /// Error name (truncated to 20 bytes on the wire)
    pub error_name: String,
    /// Human-readable status text
    pub status_string: String,
}

impl StatusMessage {
    /// OK status with a description
    pub fn ok(status_string: &str) -> Self {
        StatusMessage {
            code: code::OK,
            subcode: 0,
            error_name: String::new(),
            status_string: status_string.to_string(),
        }
    }

    /// Error status
    pub fn error(error_name: &str, status_string: &str) -> Self {
        StatusMessage {
            code: code::UNKNOWN_ERROR,
            subcode: 0,
            error_name: error_name.to_string(),
            status_string: status_string.to_string(),
        }
    }

    /// True when `code` is [`code::OK`]
    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

impl Default for StatusMessage {
    fn default() -> Self {
        StatusMessage {
            code: code::INVALID,
            subcode: 0,
            error_name: String::new(),
            status_string: String::new(),
        }
    }
}

impl Message for StatusMessage {
    fn message_type() -> &'static str {
        "STATUS"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MIN_BODY_SIZE + self.status_string.len());
        buf.put_u16(self.code);
        buf.put_i64(self.subcode);

        let mut name = [0u8; ERROR_NAME_LEN];
        let len = self.error_name.len().min(ERROR_NAME_LEN);
        name[..len].copy_from_slice(&self.error_name.as_bytes()[..len]);
        buf.extend_from_slice(&name);

        buf.extend_from_slice(self.status_string.as_bytes());
        buf.put_u8(0);
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_BODY_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: MIN_BODY_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let code = cursor.get_u16();
        let subcode = cursor.get_i64();

        let mut name = [0u8; ERROR_NAME_LEN];
        cursor.copy_to_slice(&mut name);
        let error_name = String::from_utf8_lossy(&name)
            .trim_end_matches('\0')
            .to_string();

        let text: Vec<u8> = data[cursor.position() as usize..]
            .iter()
            .take_while(|&&b| b != 0)
            .copied()
            .collect();

        Ok(StatusMessage {
            code,
            subcode,
            error_name,
            status_string: String::from_utf8(text)?,
        })
    }
}

/// Add STATUS to a factory
pub fn register(factory: &MessageFactory) {
    factory.register_message::<StatusMessage>();
}
