//! RTS_* ready-to-send replies
//!
//! Every RTS message carries a single big-endian u16 status. A provider
//! sends one with [`RTS_NOT_AVAILABLE`] when it has nothing to answer a
//! request with.
//!
//! Names use the wire spelling that fits the 12-byte type field, so the
//! reply to `GET_TRANSFORM` is `RTS_TRANS`.

use crate::error::{IgtlError, Result};
use crate::protocol::factory::MessageFactory;

/// Status of a reply that cannot be served
pub const RTS_NOT_AVAILABLE: u16 = 0;
/// Status of a request that was accepted
pub const RTS_OK: u16 = 1;

macro_rules! impl_rts {
    ($name:ident, $type_str:expr) => {
        #[doc = concat!("`", $type_str, "` message")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name {
            /// [`RTS_OK`] or [`RTS_NOT_AVAILABLE`]
            pub status: u16,
        }

        impl $name {
            /// Accepted
            pub fn ok() -> Self {
                Self { status: RTS_OK }
            }

            /// Not available
            pub fn not_available() -> Self {
                Self {
                    status: RTS_NOT_AVAILABLE,
                }
            }
        }

        impl $crate::protocol::message::Message for $name {
            fn message_type() -> &'static str {
                $type_str
            }

            fn encode_content(&self) -> Result<Vec<u8>> {
                Ok(self.status.to_be_bytes().to_vec())
            }

            fn decode_content(data: &[u8]) -> Result<Self> {
                decode_status(data).map(|status| Self { status })
            }
        }
    };
}

impl_rts!(RtsCapabilityMessage, "RTS_CAPABIL");
impl_rts!(RtsStatusMessage, "RTS_STATUS");
impl_rts!(RtsTransformMessage, "RTS_TRANS");
impl_rts!(RtsStringMessage, "RTS_STRING");
impl_rts!(RtsImageMessage, "RTS_IMAGE");
impl_rts!(RtsTDataMessage, "RTS_TDATA");
impl_rts!(RtsPointMessage, "RTS_POINT");

fn decode_status(data: &[u8]) -> Result<u16> {
    match data {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(IgtlError::InvalidSize {
            expected: 2,
            actual: data.len(),
        }),
    }
}

pub(super) fn register(factory: &MessageFactory) {
    factory.register_message::<RtsCapabilityMessage>();
    factory.register_message::<RtsStatusMessage>();
    factory.register_message::<RtsTransformMessage>();
    factory.register_message::<RtsStringMessage>();
    factory.register_message::<RtsImageMessage>();
    factory.register_message::<RtsTDataMessage>();
    factory.register_message::<RtsPointMessage>();
}
