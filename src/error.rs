//! Error types for OpenIGTLink transport and command dispatch
//!
//! This module defines all error types that can occur while framing messages,
//! moving them over a device connection, and resolving message types.

use thiserror::Error;

/// OpenIGTLink error types
///
/// All fallible operations in this library return `Result<T, IgtlError>`.
/// Framing problems inside the receive loop are converted to log events and
/// never escape the transport; the variants below are what callers can see.
#[derive(Error, Debug)]
pub enum IgtlError {
    /// Invalid header format or content
    ///
    /// This error occurs when:
    /// - Header version field is not 1, 2, or 3
    /// - Message type is empty or contains non-printable characters
    /// - Type name exceeds 12 bytes or device name exceeds 20 bytes on encode
    ///
    /// # Example
    /// ```no_run
    /// # use openigtlink_provider::error::IgtlError;
    /// let err = IgtlError::InvalidHeader("Version must be 1, 2, or 3".to_string());
    /// ```
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// CRC checksum mismatch
    ///
    /// The frame body does not match the CRC-64 carried in its header. The
    /// frame is discarded and the stream is resynchronized.
    ///
    /// # Example
    /// ```no_run
    /// # use openigtlink_provider::error::IgtlError;
    /// let err = IgtlError::CrcMismatch {
    ///     expected: 0x1234567890abcdef,
    ///     actual: 0x1234567890abcdee,
    /// };
    /// ```
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// CRC value received in the message header
        expected: u64,
        /// CRC value calculated from the received body
        actual: u64,
    },

    /// Unknown or unsupported message type
    ///
    /// Returned when a message type has no constructor in the
    /// [`MessageFactory`](crate::protocol::factory::MessageFactory).
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// A raw message was decoded as the wrong typed content
    #[error("Message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type name required by the typed content
        expected: String,
        /// Type name carried by the raw message
        actual: String,
    },

    /// Invalid message size
    ///
    /// This error occurs when:
    /// - Message body is shorter than its fixed layout requires
    /// - Array sizes in a body don't match declared counts
    #[error("Invalid message size: expected {expected}, got {actual}")]
    InvalidSize {
        /// Expected size in bytes based on message format
        expected: usize,
        /// Actual size in bytes received or parsed
        actual: usize,
    },

    /// I/O error occurred during network communication
    ///
    /// Wraps standard library I/O errors: refused connections, resets,
    /// broken pipes and bind failures.
    ///
    /// # Example
    /// ```no_run
    /// # use openigtlink_provider::error::IgtlError;
    /// # use std::io;
    /// let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused");
    /// let err = IgtlError::Io(io_err);
    /// ```
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Message body size exceeds maximum allowed
    ///
    /// Protects the receive loop against frames declaring impossibly large
    /// bodies.
    ///
    /// # Example
    /// ```no_run
    /// # use openigtlink_provider::error::IgtlError;
    /// let err = IgtlError::BodyTooLarge {
    ///     size: 5_000_000_000,
    ///     max: 268_435_456,
    /// };
    /// ```
    #[error("Message body too large: {size} bytes (max: {max})")]
    BodyTooLarge {
        /// Actual body size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
    },

    /// The device connection is closed and its queues are drained
    #[error("Device disconnected")]
    Disconnected,

    /// A bounded queue rejected a message
    #[error("Queue full (capacity: {capacity})")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Invalid configuration file or value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for IgtlError {
    fn from(err: toml::de::Error) -> Self {
        IgtlError::Config(err.to_string())
    }
}

/// Result type alias for OpenIGTLink operations
pub type Result<T> = std::result::Result<T, IgtlError>;
