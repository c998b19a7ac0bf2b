//! OpenIGTLink frame header
//!
//! The header is a fixed 58-byte structure that precedes every body on the
//! wire. It names the body's schema (type name), carries the sender's name
//! and timestamp, the body length and a CRC-64 over the body.

use crate::error::{IgtlError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Width of the type name field
pub const TYPE_NAME_LEN: usize = 12;
/// Width of the device name field
pub const DEVICE_NAME_LEN: usize = 20;

/// Type-safe wrapper for message type name (12 bytes, null-padded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName([u8; TYPE_NAME_LEN]);

impl TypeName {
    /// Create a new TypeName from a string
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > TYPE_NAME_LEN {
            return Err(IgtlError::InvalidHeader(format!(
                "Type name too long: {} bytes (max: {})",
                name.len(),
                TYPE_NAME_LEN
            )));
        }
        let mut bytes = [0u8; TYPE_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(TypeName(bytes))
    }

    /// Get the type name as a string (trimming null bytes)
    pub fn as_str(&self) -> Result<&str> {
        let len = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TYPE_NAME_LEN);
        std::str::from_utf8(&self.0[..len])
            .map_err(|_| IgtlError::InvalidHeader("Invalid UTF-8 in type name".to_string()))
    }

    /// Raw field bytes as they appear on the wire
    pub fn as_bytes(&self) -> &[u8; TYPE_NAME_LEN] {
        &self.0
    }
}

impl From<[u8; TYPE_NAME_LEN]> for TypeName {
    fn from(bytes: [u8; TYPE_NAME_LEN]) -> Self {
        TypeName(bytes)
    }
}

/// Type-safe wrapper for device name (20 bytes, null-padded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceName([u8; DEVICE_NAME_LEN]);

impl DeviceName {
    /// Create a new DeviceName from a string
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > DEVICE_NAME_LEN {
            return Err(IgtlError::InvalidHeader(format!(
                "Device name too long: {} bytes (max: {})",
                name.len(),
                DEVICE_NAME_LEN
            )));
        }
        let mut bytes = [0u8; DEVICE_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(DeviceName(bytes))
    }

    /// Get the device name as a string (trimming null bytes)
    pub fn as_str(&self) -> Result<&str> {
        let len = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DEVICE_NAME_LEN);
        std::str::from_utf8(&self.0[..len])
            .map_err(|_| IgtlError::InvalidHeader("Invalid UTF-8 in device name".to_string()))
    }
}

impl From<[u8; DEVICE_NAME_LEN]> for DeviceName {
    fn from(bytes: [u8; DEVICE_NAME_LEN]) -> Self {
        DeviceName(bytes)
    }
}

/// High-precision timestamp for OpenIGTLink messages
///
/// - Upper 32 bits: seconds since Unix epoch (UTC)
/// - Lower 32 bits: fractional seconds in units of 2^-32 s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Seconds since Unix epoch (1970-01-01 00:00:00 UTC)
    pub seconds: u32,
    /// Fractional seconds as a 32-bit value (nanoseconds * 2^32 / 1_000_000_000)
    pub fraction: u32,
}

impl Timestamp {
    /// Create a new timestamp from seconds and fraction
    pub fn new(seconds: u32, fraction: u32) -> Self {
        Timestamp { seconds, fraction }
    }

    /// Create a timestamp representing the current time
    ///
    /// # Examples
    ///
    /// ```
    /// use openigtlink_provider::protocol::header::Timestamp;
    ///
    /// let ts = Timestamp::now();
    /// assert!(ts.seconds > 0);
    /// ```
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_nanos(now.as_nanos() as u64)
    }

    /// Create a zero timestamp (no timestamp)
    pub fn zero() -> Self {
        Timestamp::default()
    }

    /// Convert to OpenIGTLink wire format (u64)
    pub fn to_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | (self.fraction as u64)
    }

    /// Create from OpenIGTLink wire format (u64)
    pub fn from_u64(value: u64) -> Self {
        Timestamp {
            seconds: (value >> 32) as u32,
            fraction: (value & 0xFFFF_FFFF) as u32,
        }
    }

    /// Convert to nanoseconds since Unix epoch
    ///
    /// # Examples
    ///
    /// ```
    /// use openigtlink_provider::protocol::header::Timestamp;
    ///
    /// let ts = Timestamp::new(1000, 0x80000000); // 1000.5 seconds
    /// assert_eq!(ts.to_nanos(), 1_000_500_000_000);
    /// ```
    pub fn to_nanos(self) -> u64 {
        let sec_nanos = (self.seconds as u64) * 1_000_000_000;
        let frac_nanos = ((self.fraction as u64) * 1_000_000_000) / 0x1_0000_0000;
        sec_nanos + frac_nanos
    }

    /// Create from nanoseconds since Unix epoch
    pub fn from_nanos(nanos: u64) -> Self {
        let seconds = (nanos / 1_000_000_000) as u32;
        let remaining_nanos = nanos % 1_000_000_000;
        let fraction = (remaining_nanos * 0x1_0000_0000 / 1_000_000_000) as u32;

        Timestamp { seconds, fraction }
    }
}

/// OpenIGTLink message header (58 bytes fixed size)
///
/// # Layout (all numerical values in big-endian)
/// ```text
/// offset  size  field
///      0     2  version       u16
///      2    12  type name     char[12], null-padded
///     14    20  device name   char[20], null-padded
///     34     8  timestamp     u64 (seconds << 32 | fraction)
///     42     8  body size     u64
///     50     8  crc           u64 (CRC-64 over the body)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Protocol version number
    pub version: u16,
    /// Message type name
    pub type_name: TypeName,
    /// Unique device name
    pub device_name: DeviceName,
    /// High-precision timestamp
    pub timestamp: Timestamp,
    /// Size of the body in bytes
    pub body_size: u64,
    /// 64-bit CRC for body data
    pub crc: u64,
}

impl Header {
    /// Header size in bytes
    pub const SIZE: usize = 58;

    /// Highest header version understood by this implementation
    pub const MAX_VERSION: u16 = 3;

    /// Decode a header from a byte slice
    ///
    /// Only the layout is decoded here; use [`check_plausible`] to reject
    /// headers that cannot start a real frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(IgtlError::InvalidSize {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(buf);

        let version = cursor.get_u16();

        let mut type_bytes = [0u8; TYPE_NAME_LEN];
        cursor.copy_to_slice(&mut type_bytes);

        let mut device_bytes = [0u8; DEVICE_NAME_LEN];
        cursor.copy_to_slice(&mut device_bytes);

        let timestamp = Timestamp::from_u64(cursor.get_u64());
        let body_size = cursor.get_u64();
        let crc = cursor.get_u64();

        Ok(Header {
            version,
            type_name: TypeName::from(type_bytes),
            device_name: DeviceName::from(device_bytes),
            timestamp,
            body_size,
            crc,
        })
    }

    /// Encode the header into a buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_u16(self.version);
        buf.put_slice(&self.type_name.0);
        buf.put_slice(&self.device_name.0);
        buf.put_u64(self.timestamp.to_u64());
        buf.put_u64(self.body_size);
        buf.put_u64(self.crc);
    }

    /// Encode the header into a byte vector
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode_into(&mut buf);
        buf.to_vec()
    }
}

/// Check whether `buf` could be the start of an OpenIGTLink header
///
/// Works on partial headers: only the fields fully present in `buf` are
/// checked. A valid header (or any prefix of one) always passes, so this is
/// safe to use both for rejecting a frame and for scanning forward after
/// corruption.
pub fn check_plausible(buf: &[u8], max_body_size: u64) -> Result<()> {
    if buf.len() >= 2 {
        let version = u16::from_be_bytes([buf[0], buf[1]]);
        if version == 0 || version > Header::MAX_VERSION {
            return Err(IgtlError::InvalidHeader(format!(
                "Unsupported header version {}",
                version
            )));
        }
    }

    let type_field = &buf[buf.len().min(2)..buf.len().min(2 + TYPE_NAME_LEN)];
    if let Some(&first) = type_field.first() {
        if first == 0 {
            return Err(IgtlError::InvalidHeader("Empty type name".to_string()));
        }
    }
    let name_len = type_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(type_field.len());
    if !type_field[..name_len]
        .iter()
        .all(|&b| b.is_ascii_graphic())
    {
        return Err(IgtlError::InvalidHeader(
            "Type name contains non-printable characters".to_string(),
        ));
    }

    if buf.len() >= 50 {
        let body_size = u64::from_be_bytes([
            buf[42], buf[43], buf[44], buf[45], buf[46], buf[47], buf[48], buf[49],
        ]);
        if body_size > max_body_size {
            return Err(IgtlError::BodyTooLarge {
                size: body_size as usize,
                max: max_body_size as usize,
            });
        }
    }

    Ok(())
}
