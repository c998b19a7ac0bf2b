//! Streaming control messages (STT_*, STP_*)

use super::impl_empty_query;
use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;
use bytes::{Buf, BufMut};

/// Width of the coordinate name field in STT_ bodies
pub const COORDINATE_NAME_LEN: usize = 32;
const START_BODY_SIZE: usize = 4 + COORDINATE_NAME_LEN;

impl_empty_query!(StopTDataMessage, "STP_TDATA");
impl_empty_query!(StopTransformMessage, "STP_TRANS");
impl_empty_query!(StopImageMessage, "STP_IMAGE");
impl_empty_query!(StopPointMessage, "STP_POINT");
impl_empty_query!(StopStatusMessage, "STP_STATUS");

/// Define a start-streaming message
///
/// Body: resolution (u32 ms, big-endian) + coordinate name (char[32]).
/// An empty body is accepted and means "sender's default".
macro_rules! impl_start_stream {
    ($name:ident, $type_str:expr) => {
        #[doc = concat!("`", $type_str, "` message")]
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            /// Minimum interval between streamed messages in milliseconds (0 = as fast as possible)
            pub resolution: u32,
            /// Coordinate system the data should be expressed in
            pub coordinate_name: String,
        }

        impl $name {
            /// Request streaming at `resolution` ms in `coordinate_name`
            pub fn new(resolution: u32, coordinate_name: &str) -> Self {
                Self {
                    resolution,
                    coordinate_name: coordinate_name.to_string(),
                }
            }
        }

        impl $crate::protocol::message::Message for $name {
            fn message_type() -> &'static str {
                $type_str
            }

            fn encode_content(&self) -> Result<Vec<u8>> {
                encode_start(self.resolution, &self.coordinate_name)
            }

            fn decode_content(data: &[u8]) -> Result<Self> {
                let (resolution, coordinate_name) = decode_start(data)?;
                Ok(Self {
                    resolution,
                    coordinate_name,
                })
            }
        }
    };
}

impl_start_stream!(StartTDataMessage, "STT_TDATA");
impl_start_stream!(StartTransformMessage, "STT_TRANS");
impl_start_stream!(StartImageMessage, "STT_IMAGE");
impl_start_stream!(StartPointMessage, "STT_POINT");
impl_start_stream!(StartStatusMessage, "STT_STATUS");

fn encode_start(resolution: u32, coordinate_name: &str) -> Result<Vec<u8>> {
    if coordinate_name.len() > COORDINATE_NAME_LEN {
        return Err(IgtlError::InvalidSize {
            expected: COORDINATE_NAME_LEN,
            actual: coordinate_name.len(),
        });
    }

    let mut buf = Vec::with_capacity(START_BODY_SIZE);
    buf.put_u32(resolution);
    let mut name = [0u8; COORDINATE_NAME_LEN];
    name[..coordinate_name.len()].copy_from_slice(coordinate_name.as_bytes());
    buf.extend_from_slice(&name);
    Ok(buf)
}

fn decode_start(mut data: &[u8]) -> Result<(u32, String)> {
    if data.is_empty() {
        return Ok((0, String::new()));
    }
    if data.len() < START_BODY_SIZE {
        return Err(IgtlError::InvalidSize {
            expected: START_BODY_SIZE,
            actual: data.len(),
        });
    }

    let resolution = data.get_u32();
    let name = &data[..COORDINATE_NAME_LEN];
    let len = name.iter().position(|&b| b == 0).unwrap_or(COORDINATE_NAME_LEN);
    Ok((resolution, String::from_utf8(name[..len].to_vec())?))
}

pub(super) fn register(factory: &MessageFactory) {
    factory.register_message::<StartTDataMessage>();
    factory.register_message::<StartTransformMessage>();
    factory.register_message::<StartImageMessage>();
    factory.register_message::<StartPointMessage>();
    factory.register_message::<StartStatusMessage>();

    factory.register_message::<StopTDataMessage>();
    factory.register_message::<StopTransformMessage>();
    factory.register_message::<StopImageMessage>();
    factory.register_message::<StopPointMessage>();
    factory.register_message::<StopStatusMessage>();
}
