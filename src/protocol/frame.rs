//! Frame encoding and incremental decoding
//!
//! Wire format:
//! ```text
//! ┌────────────────────────────── header (58 B, big-endian) ─────────────────────────────┐
//! │ version u16 │ type char[12] │ device char[20] │ timestamp u64 │ body_size u64 │ crc u64 │ body…
//! └──────────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding distinguishes three outcomes: a complete frame, an incomplete
//! frame (wait for more bytes) and a corrupt frame (discard and resync).

use crate::error::{IgtlError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{check_plausible, Header};
use crate::protocol::raw::RawMessage;
use bytes::{Buf, BufMut, BytesMut};
use tracing::{trace, warn};

/// Default maximum body size accepted by the decoder: 256 MiB
pub const DEFAULT_MAX_BODY_SIZE: u64 = 256 * 1024 * 1024;

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Check bodies against the header CRC
    pub verify_crc: bool,
    /// Frames declaring larger bodies are treated as corrupt
    pub max_body_size: u64,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            verify_crc: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Outcome of decoding the front of a byte buffer
#[derive(Debug)]
pub enum FrameStatus {
    /// A whole frame was decoded from the first `consumed` bytes
    Complete {
        /// The decoded message
        message: RawMessage,
        /// Header + body length
        consumed: usize,
    },
    /// The buffer holds a prefix of a frame; at least `needed` more bytes are required
    Incomplete {
        /// Minimum number of additional bytes
        needed: usize,
    },
    /// The buffer does not start with a valid frame
    Corrupt(IgtlError),
}

impl FrameStatus {
    /// True for [`FrameStatus::Complete`]
    pub fn is_complete(&self) -> bool {
        matches!(self, FrameStatus::Complete { .. })
    }

    /// True for [`FrameStatus::Incomplete`]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameStatus::Incomplete { .. })
    }

    /// True for [`FrameStatus::Corrupt`]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, FrameStatus::Corrupt(_))
    }
}

/// Append the wire form of `msg` to `dst`
///
/// # Errors
///
/// - [`IgtlError::InvalidHeader`] - type name > 12 bytes or device name > 20 bytes
pub fn encode_frame(msg: &RawMessage, dst: &mut BytesMut) -> Result<()> {
    let header = msg.header()?;
    dst.reserve(Header::SIZE + msg.body().len());
    header.encode_into(dst);
    dst.put_slice(msg.body());
    Ok(())
}

/// Decode the frame at the start of `src`
///
/// Never fails with an error: every problem is reported as
/// [`FrameStatus::Corrupt`]. Any strict prefix of a valid frame yields
/// [`FrameStatus::Incomplete`].
pub fn decode_frame(src: &[u8], options: &FrameOptions) -> FrameStatus {
    if let Err(e) = check_plausible(src, options.max_body_size) {
        return FrameStatus::Corrupt(e);
    }

    if src.len() < Header::SIZE {
        return FrameStatus::Incomplete {
            needed: Header::SIZE - src.len(),
        };
    }

    let header = match Header::decode(&src[..Header::SIZE]) {
        Ok(header) => header,
        Err(e) => return FrameStatus::Corrupt(e),
    };

    let frame_len = Header::SIZE + header.body_size as usize;
    if src.len() < frame_len {
        return FrameStatus::Incomplete {
            needed: frame_len - src.len(),
        };
    }

    let body = &src[Header::SIZE..frame_len];
    if options.verify_crc {
        let calculated = calculate_crc(body);
        if calculated != header.crc {
            return FrameStatus::Corrupt(IgtlError::CrcMismatch {
                expected: header.crc,
                actual: calculated,
            });
        }
    }

    match RawMessage::from_header(&header, bytes::Bytes::copy_from_slice(body)) {
        Ok(message) => FrameStatus::Complete {
            message,
            consumed: frame_len,
        },
        Err(e) => FrameStatus::Corrupt(e),
    }
}

/// Counters kept by a [`FrameDecoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames decoded successfully
    pub frames: u64,
    /// Corrupt frames encountered
    pub corrupt_frames: u64,
    /// Bytes thrown away while resynchronizing
    pub bytes_discarded: u64,
}

/// Incremental frame decoder over a growing byte buffer
///
/// Bytes are appended as they arrive from the stream; complete frames are
/// taken off the front. A corrupt frame never stalls the decoder: the
/// offending bytes are skipped up to the next position that can start a
/// header.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    options: FrameOptions,
    stats: FrameStats,
}

impl FrameDecoder {
    /// Create a decoder with the given options
    pub fn new(options: FrameOptions) -> Self {
        Self {
            buf: BytesMut::with_capacity(Header::SIZE * 4),
            options,
            stats: FrameStats::default(),
        }
    }

    /// Append received bytes
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes waiting to be decoded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decoder counters
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Take the next complete frame, if any
    ///
    /// Returns `None` when the buffered bytes are only a partial frame.
    pub fn next_frame(&mut self) -> Option<RawMessage> {
        loop {
            match decode_frame(&self.buf, &self.options) {
                FrameStatus::Complete { message, consumed } => {
                    self.buf.advance(consumed);
                    self.stats.frames += 1;
                    trace!(
                        msg_type = message.type_name(),
                        bytes = consumed,
                        "Frame decoded"
                    );
                    return Some(message);
                }
                FrameStatus::Incomplete { needed } => {
                    trace!(buffered = self.buf.len(), needed, "Waiting for more bytes");
                    return None;
                }
                FrameStatus::Corrupt(error) => {
                    self.stats.corrupt_frames += 1;
                    let skipped = self.resync();
                    warn!(
                        error = %error,
                        skipped,
                        "Discarding corrupt frame"
                    );
                }
            }
        }
    }

    /// Drop bytes up to the next plausible header start
    fn resync(&mut self) -> usize {
        let start = (1..=self.buf.len())
            .find(|&offset| {
                let window_end = self.buf.len().min(offset + Header::SIZE);
                check_plausible(&self.buf[offset..window_end], self.options.max_body_size).is_ok()
            })
            .unwrap_or(self.buf.len());

        self.buf.advance(start);
        self.stats.bytes_discarded += start as u64;
        start
    }
}
