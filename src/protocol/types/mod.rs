//! Message body codecs
//!
//! Each module implements [`Message`](crate::protocol::message::Message) for
//! its types and contributes a `register` function adding them to a
//! [`MessageFactory`].

pub mod capability;
pub mod query;
pub mod status;
pub mod string;
pub mod transform;

pub use capability::CapabilityMessage;
pub use query::*;
pub use status::StatusMessage;
pub use string::StringMessage;
pub use transform::TransformMessage;

use crate::protocol::factory::MessageFactory;

/// Register every codec of this crate, aliases included
pub fn register_standard_types(factory: &MessageFactory) {
    transform::register(factory);
    status::register(factory);
    capability::register(factory);
    string::register(factory);
    query::register(factory);
}
