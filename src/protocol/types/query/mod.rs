//! Query and streaming control messages
//!
//! - **GET_***: one-shot request, empty body
//! - **STT_***: start streaming, optional resolution + coordinate name
//! - **STP_***: stop streaming, empty body
//! - **RTS_***: ready-to-send reply, 2-byte status
//!
//! Wire names are abbreviated where the full name would overflow the 12-byte
//! type field (`GET_TRANS`, `RTS_CAPABIL`).

pub mod get;
pub mod rts;
pub mod streaming;

pub use get::*;
pub use rts::*;
pub use streaming::*;

use crate::protocol::factory::MessageFactory;

/// Define an empty-body command message
///
/// ```ignore
/// impl_empty_query!(GetStatusMessage, "GET_STATUS");
/// ```
macro_rules! impl_empty_query {
    ($name:ident, $type_str:expr) => {
        #[doc = concat!("`", $type_str, "` message")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $crate::protocol::message::Message for $name {
            fn message_type() -> &'static str {
                $type_str
            }

            fn encode_content(&self) -> $crate::error::Result<Vec<u8>> {
                Ok(vec![])
            }

            fn decode_content(_data: &[u8]) -> $crate::error::Result<Self> {
                Ok(Self)
            }
        }
    };
}

pub(crate) use impl_empty_query;

/// Add every GET_/STT_/STP_/RTS_ message to a factory
pub fn register(factory: &MessageFactory) {
    get::register(factory);
    streaming::register(factory);
    rts::register(factory);
}
