//! Untyped OpenIGTLink message
//!
//! A [`RawMessage`] is what the transport moves around: the header fields
//! plus the body as opaque bytes. The body only becomes meaningful once a
//! codec is picked from its type name, see [`RawMessage::decode`].

use crate::error::Result;
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{DeviceName, Header, Timestamp, TypeName};
use crate::protocol::message::{IgtlMessage, Message};
use bytes::Bytes;

/// A framed message whose body has not been interpreted
///
/// Type and device names are plain strings in memory. They are checked
/// against the 12/20 byte header fields only when the message is encoded,
/// so in-process commands such as `GET_TRANSFORM` can be represented even
/// though their wire form would be truncated by peers.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    version: u16,
    type_name: String,
    device_name: String,
    timestamp: Timestamp,
    body: Bytes,
}

impl RawMessage {
    /// Create a Version 2 message stamped with the current time
    pub fn new(
        type_name: impl Into<String>,
        device_name: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        RawMessage {
            version: 2,
            type_name: type_name.into(),
            device_name: device_name.into(),
            timestamp: Timestamp::now(),
            body: body.into(),
        }
    }

    /// Create an empty-bodied message, the shape of most GET_/STP_ requests
    pub fn empty(type_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self::new(type_name, device_name, Bytes::new())
    }

    /// Build from a decoded header and its body bytes
    pub fn from_header(header: &Header, body: Bytes) -> Result<Self> {
        Ok(RawMessage {
            version: header.version,
            type_name: header.type_name.as_str()?.to_string(),
            device_name: header.device_name.as_str()?.to_string(),
            timestamp: header.timestamp,
            body,
        })
    }

    /// Encode typed content into a raw message
    pub fn from_content<T: Message>(content: &T, device_name: &str) -> Result<Self> {
        Ok(Self::new(
            T::message_type(),
            device_name,
            content.encode_content()?,
        ))
    }

    /// Convert a typed message, keeping its header fields and extended header
    pub fn from_message<T: Message>(msg: &IgtlMessage<T>) -> Result<Self> {
        let body = msg.encode_body()?;
        Self::from_header(&msg.header, Bytes::from(body))
    }

    /// Message type name, e.g. `TRANSFORM` or `GET_STATUS`
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the device that produced the message
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Re-tag the message with another device name
    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = name.into();
    }

    /// Header version
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Timestamp carried by the message
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Replace the timestamp
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Opaque body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Build the wire header for this message
    ///
    /// Fails when the names do not fit their header fields.
    pub fn header(&self) -> Result<Header> {
        Ok(Header {
            version: self.version,
            type_name: TypeName::new(&self.type_name)?,
            device_name: DeviceName::new(&self.device_name)?,
            timestamp: self.timestamp,
            body_size: self.body.len() as u64,
            crc: calculate_crc(&self.body),
        })
    }

    /// Interpret the body with the codec of `T`
    ///
    /// # Errors
    ///
    /// - [`IgtlError::TypeMismatch`](crate::error::IgtlError::TypeMismatch) - `T` is not this message's type
    /// - codec errors from [`Message::decode_content`]
    pub fn decode<T: Message>(&self) -> Result<IgtlMessage<T>> {
        IgtlMessage::from_parts(self.header()?, &self.body, false)
    }

    /// Encode into a complete frame (header + body)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = bytes::BytesMut::with_capacity(Header::SIZE + self.body.len());
        crate::protocol::frame::encode_frame(self, &mut buf)?;
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IgtlError;
    use crate::protocol::types::{StatusMessage, TransformMessage};

    #[test]
    fn test_from_content_and_decode() {
        let raw = RawMessage::from_content(&TransformMessage::translation(1.0, 2.0, 3.0), "Tool")
            .unwrap();
        assert_eq!(raw.type_name(), "TRANSFORM");
        assert_eq!(raw.body().len(), 48);

        let typed = raw.decode::<TransformMessage>().unwrap();
        assert_eq!(typed.content, TransformMessage::translation(1.0, 2.0, 3.0));
        assert_eq!(typed.header.device_name.as_str().unwrap(), "Tool");
    }

    #[test]
    fn test_decode_wrong_type() {
        let raw = RawMessage::from_content(&StatusMessage::ok("ready"), "Dev").unwrap();
        let result = raw.decode::<TransformMessage>();
        assert!(matches!(result, Err(IgtlError::TypeMismatch { .. })));
    }

    #[test]
    fn test_set_device_name() {
        let mut raw = RawMessage::empty("GET_STATUS", "Client");
        raw.set_device_name("Renamed");
        assert_eq!(raw.device_name(), "Renamed");
        assert_eq!(raw.type_name(), "GET_STATUS");
    }

    #[test]
    fn test_long_names_fail_only_on_encode() {
        let raw = RawMessage::empty("GET_TRANSFORM", "Client");
        assert_eq!(raw.type_name(), "GET_TRANSFORM");
        assert!(matches!(raw.encode(), Err(IgtlError::InvalidHeader(_))));
    }

    #[test]
    fn test_from_message_keeps_extended_header() {
        let mut msg = IgtlMessage::new(StatusMessage::ok("v3"), "Dev").unwrap();
        msg.set_extended_header(vec![1, 2, 3]);

        let raw = RawMessage::from_message(&msg).unwrap();
        assert_eq!(raw.version(), 3);

        let typed = raw.decode::<StatusMessage>().unwrap();
        assert_eq!(typed.get_extended_header(), Some(&[1, 2, 3][..]));
        assert_eq!(typed.content.status_string, "v3");
    }
}
