//! TRANSFORM message type
//!
//! A 4x4 homogeneous transform. Only the upper 3x4 part travels on the
//! wire; the last row is always `[0, 0, 0, 1]`.

use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const BODY_SIZE: usize = 12 * 4;

/// TRANSFORM message body
///
/// Encoded column by column as 12 big-endian `f32`:
/// `R11 R21 R31 R12 R22 R32 R13 R23 R33 TX TY TZ`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMessage {
    /// Row-major 4x4 matrix
    pub matrix: [[f32; 4]; 4],
}

impl TransformMessage {
    /// Identity transform
    pub fn identity() -> Self {
        TransformMessage {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Pure translation
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut transform = Self::identity();
        transform.matrix[0][3] = x;
        transform.matrix[1][3] = y;
        transform.matrix[2][3] = z;
        transform
    }

    /// Translation column `[tx, ty, tz]`
    pub fn position(&self) -> [f32; 3] {
        [self.matrix[0][3], self.matrix[1][3], self.matrix[2][3]]
    }
}

impl Default for TransformMessage {
    fn default() -> Self {
        Self::identity()
    }
}

impl Message for TransformMessage {
    fn message_type() -> &'static str {
        "TRANSFORM"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(BODY_SIZE);
        for col in 0..4 {
            for row in &self.matrix[..3] {
                buf.put_f32(row[col]);
            }
        }
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() != BODY_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: BODY_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let mut matrix = [[0.0f32; 4]; 4];
        for col in 0..4 {
            for row in matrix.iter_mut().take(3) {
                row[col] = cursor.get_f32();
            }
        }
        matrix[3] = [0.0, 0.0, 0.0, 1.0];

        Ok(TransformMessage { matrix })
    }
}

/// Add TRANSFORM to a factory
///
/// Peers abbreviate the name to fit the 12-byte header field of command
/// messages (`GET_TRANS`, `STP_TRANSFOR`), so both short forms are aliased.
pub fn register(factory: &MessageFactory) {
    factory.register_alias("TRANS", "TRANSFORM");
    factory.register_alias("TRANSFOR", "TRANSFORM");
    factory.register_message::<TransformMessage>();
}
