//! Command provider
//!
//! Sources publish themselves in a [`SourceRegistry`]; a [`MessageProvider`]
//! answers the commands arriving on a device from whatever is published at
//! that moment.

pub mod device_source;
pub mod dispatcher;
pub mod registry;
pub mod source;

pub use device_source::DeviceMessageSource;
pub use dispatcher::{Dispatch, MessageProvider};
pub use registry::{
    Properties, PropertyFilter, SourceRegistration, SourceRegistry, PROP_DEVICE_TYPE, PROP_NAME,
};
pub use source::{CapabilitySource, LatestMessageSource, MessageSource, PollingSource};
