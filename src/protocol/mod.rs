//! OpenIGTLink protocol layer
//!
//! Framing ([`header`], [`crc`], [`frame`]), message representations
//! ([`raw`] untyped, [`message`] typed), the command prefix grammar
//! ([`request`]) and the runtime type registry ([`factory`]).

pub mod crc;
pub mod factory;
pub mod frame;
pub mod header;
pub mod message;
pub mod raw;
pub mod request;
pub mod types;

pub use crc::{calculate_crc, verify_crc};
pub use factory::{MessageConstructor, MessageFactory};
pub use frame::{decode_frame, encode_frame, FrameDecoder, FrameOptions, FrameStatus};
pub use header::{DeviceName, Header, Timestamp, TypeName};
pub use message::{IgtlMessage, Message};
pub use raw::RawMessage;
pub use request::RequestKind;
pub use types::{CapabilityMessage, StatusMessage, StringMessage, TransformMessage};
