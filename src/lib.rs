//! OpenIGTLink command provider
//!
//! This library moves OpenIGTLink messages over a stream socket and answers
//! the command requests a navigation application sends (`GET_`, `STT_`,
//! `STP_`) from a runtime registry of data sources.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use openigtlink_provider::io::DeviceBuilder;
//! use openigtlink_provider::protocol::{MessageFactory, TransformMessage};
//! use openigtlink_provider::provider::{LatestMessageSource, MessageProvider, SourceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), openigtlink_provider::IgtlError> {
//!     let registry = Arc::new(SourceRegistry::new());
//!     let factory = Arc::new(MessageFactory::with_standard_types());
//!
//!     let tracker = Arc::new(LatestMessageSource::with_content(
//!         "Tool",
//!         &TransformMessage::translation(10.0, 0.0, 0.0),
//!     )?);
//!     let _registration = registry.publish(&tracker);
//!
//!     let listener = DeviceBuilder::new().tcp("0.0.0.0:18944").server().listen().await?;
//!     let device = listener.accept().await?;
//!
//!     MessageProvider::new(registry, factory).serve(&device).await
//! }
//! ```
//!
//! # Architecture
//!
//! - **`protocol`** - wire format
//!   - `header` / `crc` / `frame` - 58-byte header, CRC-64, incremental framing
//!   - `raw` - [`RawMessage`](protocol::RawMessage), an untyped message whose
//!     body is decoded on demand
//!   - `factory` - runtime map from type names to constructors
//!   - `request` - the `GET_`/`STT_`/`STP_`/`RTS_` grammar
//!   - `types` - codecs for TRANSFORM, STATUS, CAPABILITY, STRING and the
//!     command types
//!
//! - **`io`** - transport
//!   - `IgtlDevice` - one connection, a receive task and two queues
//!   - `DeviceListener` - accepts devices
//!   - `DeviceBuilder` - type-state builder for both
//!
//! - **`provider`** - command dispatch
//!   - `SourceRegistry` - live directory of message sources
//!   - `MessageProvider` - answers commands and pushes streams
//!
//! - **`config`** / **`error`** - TOML configuration, [`IgtlError`]
//!
//! # Command Handling
//!
//! | Request       | Source published        | No source                        |
//! |---------------|-------------------------|----------------------------------|
//! | `GET_TRANS`   | current TRANSFORM       | `RTS_TRANS`                      |
//! | `STT_TRANS`   | streaming starts        | `RTS_TRANS`                      |
//! | `STP_TRANS`   | streaming stops         | `RTS_TRANS`                      |
//! | `GET_FOO`     | current FOO             | nothing, unless `RTS_FOO` exists |
//! | `RTS_TRANS`   | nothing                 | `RTS_TRANS`                      |

pub mod config;
pub mod error;
pub mod io;
pub mod protocol;
pub mod provider;

pub use error::{IgtlError, Result};
