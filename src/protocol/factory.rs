//! Runtime message factory
//!
//! Maps message type names to constructors producing a default message of
//! that type. The set of known types is open: applications register their
//! own at runtime, and the provider asks the factory whether an `RTS_` reply
//! exists for a requested type.
//!
//! Names are compared after alias resolution on the part following the
//! command prefix, so `RTS_TRANS`, `RTS_TRANSFOR` and `RTS_TRANSFORM` all
//! find the same constructor once `TRANS` and `TRANSFOR` are registered as
//! aliases of `TRANSFORM`.

use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use crate::protocol::raw::RawMessage;
use crate::protocol::request::{strip_request_prefix, RequestKind};
use crate::protocol::types;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Produces a fresh message of one type
pub type MessageConstructor = Arc<dyn Fn() -> Result<RawMessage> + Send + Sync>;

/// Thread-safe registry of message constructors
///
/// # Examples
///
/// ```
/// use openigtlink_provider::protocol::factory::MessageFactory;
///
/// let factory = MessageFactory::with_standard_types();
/// assert!(factory.is_registered("TRANSFORM"));
/// assert_eq!(factory.rts_type_name("GET_STATUS").as_deref(), Some("RTS_STATUS"));
///
/// let reply = factory.create("RTS_STATUS")?;
/// assert_eq!(reply.type_name(), "RTS_STATUS");
/// # Ok::<(), openigtlink_provider::error::IgtlError>(())
/// ```
#[derive(Default)]
pub struct MessageFactory {
    constructors: RwLock<HashMap<String, MessageConstructor>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl MessageFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory that knows the message types of this crate
    pub fn with_standard_types() -> Self {
        let factory = Self::new();
        types::register_standard_types(&factory);
        factory
    }

    /// Register a constructor under `type_name`
    ///
    /// Replaces any constructor previously registered under the same name.
    pub fn register_type<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<RawMessage> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        debug!(msg_type = %type_name, "Registering message type");
        self.constructors
            .write()
            .insert(type_name, Arc::new(constructor));
    }

    /// Register `T` with its default content
    pub fn register_message<T>(&self)
    where
        T: Message + Default + 'static,
    {
        self.register_message_with(T::default);
    }

    /// Register `T` with content produced by `make`
    pub fn register_message_with<T, F>(&self, make: F)
    where
        T: Message + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_type(T::message_type(), move || {
            RawMessage::from_content(&make(), "")
        });
    }

    /// Declare `short` as another spelling of `canonical`
    pub fn register_alias(&self, short: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.write().insert(short.into(), canonical.into());
    }

    /// Resolve an alias, returning `name` unchanged if it is none
    pub fn canonical_type_name(&self, name: &str) -> String {
        self.aliases
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Look up the constructor for `type_name`
    ///
    /// Returns `None` when the type is not supported. Exact names win over
    /// alias matches.
    pub fn message_type_constructor(&self, type_name: &str) -> Option<MessageConstructor> {
        let constructors = self.constructors.read();
        if let Some(ctor) = constructors.get(type_name) {
            return Some(Arc::clone(ctor));
        }

        let wanted = self.normalize(type_name);
        constructors
            .iter()
            .find(|(name, _)| self.normalize(name) == wanted)
            .map(|(_, ctor)| Arc::clone(ctor))
    }

    /// Construct a default message of `type_name`
    ///
    /// # Errors
    ///
    /// - [`IgtlError::UnknownMessageType`] - no constructor for `type_name`
    /// - whatever the constructor itself returns
    pub fn create(&self, type_name: &str) -> Result<RawMessage> {
        let ctor = self
            .message_type_constructor(type_name)
            .ok_or_else(|| IgtlError::UnknownMessageType(type_name.to_string()))?;
        ctor()
    }

    /// True if a constructor exists for `type_name`
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.message_type_constructor(type_name).is_some()
    }

    /// Registered names, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Data type answering a request, e.g. `GET_TRANS` -> `TRANSFORM`
    ///
    /// `None` for names without a command prefix or with nothing after it.
    pub fn response_type_name(&self, request: &str) -> Option<String> {
        if !RequestKind::is_command(request) {
            return None;
        }
        let bare = strip_request_prefix(request);
        (!bare.is_empty()).then(|| self.canonical_type_name(bare))
    }

    /// `RTS_` reply name for a request, e.g. `GET_STATUS` -> `RTS_STATUS`
    ///
    /// The requested spelling is kept so the reply fits wherever the request did.
    pub fn rts_type_name(&self, request: &str) -> Option<String> {
        if !RequestKind::is_command(request) {
            return None;
        }
        let bare = strip_request_prefix(request);
        if bare.is_empty() {
            return None;
        }
        RequestKind::Rts.type_name_for(bare)
    }

    /// Prefix + canonical bare name
    fn normalize(&self, type_name: &str) -> String {
        match RequestKind::classify(type_name).prefix() {
            Some(prefix) => {
                let bare = strip_request_prefix(type_name);
                format!("{prefix}{}", self.canonical_type_name(bare))
            }
            None => self.canonical_type_name(type_name),
        }
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFactory")
            .field("types", &self.registered_types())
            .field("aliases", &self.aliases.read().len())
            .finish()
    }
}
