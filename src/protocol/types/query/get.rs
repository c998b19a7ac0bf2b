//! GET_* query messages

use super::impl_empty_query;
use crate::protocol::factory::MessageFactory;

impl_empty_query!(GetCapabilityMessage, "GET_CAPABIL");
impl_empty_query!(GetStatusMessage, "GET_STATUS");
impl_empty_query!(GetTransformMessage, "GET_TRANS");
impl_empty_query!(GetStringMessage, "GET_STRING");
impl_empty_query!(GetImageMessage, "GET_IMAGE");
impl_empty_query!(GetTDataMessage, "GET_TDATA");
impl_empty_query!(GetPointMessage, "GET_POINT");

pub(super) fn register(factory: &MessageFactory) {
    factory.register_message::<GetCapabilityMessage>();
    factory.register_message::<GetStatusMessage>();
    factory.register_message::<GetTransformMessage>();
    factory.register_message::<GetStringMessage>();
    factory.register_message::<GetImageMessage>();
    factory.register_message::<GetTDataMessage>();
    factory.register_message::<GetPointMessage>();
}
