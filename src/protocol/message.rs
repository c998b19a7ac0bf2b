//! OpenIGTLink message trait and typed message wrapper
//!
//! This module defines the common interface that all body codecs implement,
//! and the generic `IgtlMessage<T>` that pairs a header with typed content.

use crate::error::{IgtlError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{DeviceName, Header, Timestamp, TypeName};

/// Common interface for all OpenIGTLink body codecs
///
/// Each message type (TRANSFORM, STATUS, GET_STATUS, ...) implements this
/// trait to provide encoding/decoding of its body.
pub trait Message: Sized {
    /// Returns the message type name (e.g., "TRANSFORM", "RTS_STATUS")
    fn message_type() -> &'static str;

    /// Encode message content to bytes (without header)
    fn encode_content(&self) -> Result<Vec<u8>>;

    /// Decode message content from bytes (without header)
    fn decode_content(data: &[u8]) -> Result<Self>;
}

/// Complete OpenIGTLink message structure
///
/// Wraps a specific message type with header and optional Version 3
/// extended header.
#[derive(Debug)]
pub struct IgtlMessage<T: Message> {
    /// Message header (58 bytes)
    pub header: Header,
    /// Extended header (Version 3 feature, optional)
    pub extended_header: Option<Vec<u8>>,
    /// Message content
    pub content: T,
}

impl<T: Message> IgtlMessage<T> {
    /// Create a new message with the given content and device name
    ///
    /// # Arguments
    /// * `content` - Message content
    /// * `device_name` - Device name (max 20 characters)
    pub fn new(content: T, device_name: &str) -> Result<Self> {
        let content_bytes = content.encode_content()?;

        let header = Header {
            version: 2,
            type_name: TypeName::new(T::message_type())?,
            device_name: DeviceName::new(device_name)?,
            timestamp: Timestamp::now(),
            body_size: content_bytes.len() as u64,
            crc: 0, // calculated during encode
        };

        Ok(IgtlMessage {
            header,
            extended_header: None,
            content,
        })
    }

    /// Set extended header data (Version 3 feature)
    ///
    /// When extended header is set, the message version is upgraded to 3.
    pub fn set_extended_header(&mut self, data: Vec<u8>) {
        self.extended_header = Some(data);
        if self.header.version < 3 {
            self.header.version = 3;
        }
    }

    /// Get extended header data reference (Version 3 feature)
    pub fn get_extended_header(&self) -> Option<&[u8]> {
        self.extended_header.as_deref()
    }

    /// Encode the body: `[ext header size + ext header] + content`
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        let content_bytes = self.content.encode_content()?;

        match (&self.extended_header, self.header.version >= 3) {
            (Some(ext_header), true) => {
                let ext_header_size = u16::try_from(ext_header.len()).map_err(|_| {
                    IgtlError::BodyTooLarge {
                        size: ext_header.len(),
                        max: u16::MAX as usize,
                    }
                })?;

                let mut body = Vec::with_capacity(2 + ext_header.len() + content_bytes.len());
                body.extend_from_slice(&ext_header_size.to_be_bytes());
                body.extend_from_slice(ext_header);
                body.extend_from_slice(&content_bytes);
                Ok(body)
            }
            _ => Ok(content_bytes),
        }
    }

    /// Encode the complete message (header + body) to bytes
    ///
    /// Body size and CRC in the header are recomputed from the body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body_bytes = self.encode_body()?;

        let mut header = self.header.clone();
        header.body_size = body_bytes.len() as u64;
        header.crc = calculate_crc(&body_bytes);

        let mut buf = Vec::with_capacity(Header::SIZE + body_bytes.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&body_bytes);

        Ok(buf)
    }

    /// Decode a complete message from bytes, verifying the CRC
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with_options(data, true)
    }

    /// Decode a complete message from bytes
    ///
    /// # Arguments
    /// * `data` - Header followed by at least `body_size` bytes
    /// * `verify_crc` - Whether to check the body against the header CRC
    pub fn decode_with_options(data: &[u8], verify_crc: bool) -> Result<Self> {
        let header = Header::decode(data)?;

        let body_end = Header::SIZE + header.body_size as usize;
        if data.len() < body_end {
            return Err(IgtlError::InvalidSize {
                expected: body_end,
                actual: data.len(),
            });
        }

        Self::from_parts(header, &data[Header::SIZE..body_end], verify_crc)
    }

    /// Build a typed message from an already separated header and body
    pub fn from_parts(header: Header, body: &[u8], verify_crc: bool) -> Result<Self> {
        if verify_crc {
            let calculated = calculate_crc(body);
            if calculated != header.crc {
                return Err(IgtlError::CrcMismatch {
                    expected: header.crc,
                    actual: calculated,
                });
            }
        }

        let type_name = header.type_name.as_str()?;
        if type_name != T::message_type() {
            return Err(IgtlError::TypeMismatch {
                expected: T::message_type().to_string(),
                actual: type_name.to_string(),
            });
        }

        let (extended_header, content_bytes) = split_extended_header(header.version, body)?;
        let content = T::decode_content(content_bytes)?;

        Ok(IgtlMessage {
            header,
            extended_header,
            content,
        })
    }
}

/// Split a Version 3 body into extended header and content
///
/// Version 1/2 bodies are returned unchanged as content.
pub fn split_extended_header(version: u16, body: &[u8]) -> Result<(Option<Vec<u8>>, &[u8])> {
    if version < 3 || body.len() < 2 {
        return Ok((None, body));
    }

    let ext_header_size = u16::from_be_bytes([body[0], body[1]]) as usize;
    if body.len() < 2 + ext_header_size {
        return Err(IgtlError::InvalidSize {
            expected: 2 + ext_header_size,
            actual: body.len(),
        });
    }

    let ext_header = body[2..2 + ext_header_size].to_vec();
    Ok((Some(ext_header), &body[2 + ext_header_size..]))
}
