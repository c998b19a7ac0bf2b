//! Transport layer
//!
//! An [`IgtlDevice`] owns one connection and a background receive task that
//! splits inbound frames into a command queue and a data queue.
//! [`DeviceListener`] accepts devices; [`builder::DeviceBuilder`] creates
//! either side with a type-checked configuration.

pub mod builder;
pub mod device;
pub mod message_queue;
pub mod server;

pub use builder::DeviceBuilder;
pub use device::{DeviceConfig, IgtlDevice};
pub use message_queue::{MessageQueue, QueueConfig, QueueStats};
pub use server::DeviceListener;
