//! Live registry of message sources
//!
//! Sources are published with a property map and looked up by property
//! filter. The registry never keeps a source alive: entries hold weak
//! references, and every lookup re-validates them, so a source that was
//! unpublished or dropped is never handed out.

use crate::provider::source::MessageSource;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Property carrying the device type a source produces
pub const PROP_DEVICE_TYPE: &str = "igtl.devicetype";
/// Property carrying the source's name
pub const PROP_NAME: &str = "igtl.name";

/// Properties of one registration
pub type Properties = BTreeMap<String, String>;

/// Conjunction of `key == value` requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    required: Vec<(String, String)>,
}

impl PropertyFilter {
    /// Filter matching everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the device type property
    pub fn device_type(name: &str) -> Self {
        Self::new().with(PROP_DEVICE_TYPE, name)
    }

    /// Add a requirement
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.push((key.into(), value.into()));
        self
    }

    /// True if every requirement is met by `properties`
    pub fn matches(&self, properties: &Properties) -> bool {
        self.required
            .iter()
            .all(|(key, value)| properties.get(key) == Some(value))
    }
}

struct Entry {
    id: u64,
    properties: Properties,
    source: Weak<dyn MessageSource>,
}

/// Concurrent source directory
///
/// Lookups return the first live match in publication order.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use openigtlink_provider::provider::{LatestMessageSource, SourceRegistry};
///
/// let registry = Arc::new(SourceRegistry::new());
/// let tracker = Arc::new(LatestMessageSource::new("Tracker", "TRANSFORM"));
///
/// let mut registration = registry.publish(&tracker);
/// assert!(registry.find_by_device_type("TRANSFORM").is_some());
///
/// registration.unpublish();
/// assert!(registry.find_by_device_type("TRANSFORM").is_none());
/// ```
#[derive(Default)]
pub struct SourceRegistry {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `source` under its name and device type
    ///
    /// The source stays findable until the returned handle is dropped or
    /// unpublished, or until the last `Arc` to the source goes away.
    pub fn publish<S>(self: &Arc<Self>, source: &Arc<S>) -> SourceRegistration
    where
        S: MessageSource + 'static,
    {
        self.publish_with_properties(source, Properties::new())
    }

    /// Publish with additional properties
    ///
    /// `igtl.devicetype` and `igtl.name` are always set from the source and
    /// take precedence over `extra`.
    pub fn publish_with_properties<S>(
        self: &Arc<Self>,
        source: &Arc<S>,
        mut extra: Properties,
    ) -> SourceRegistration
    where
        S: MessageSource + 'static,
    {
        extra.insert(PROP_DEVICE_TYPE.to_string(), source.device_type().to_string());
        extra.insert(PROP_NAME.to_string(), source.name().to_string());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<dyn MessageSource> = Arc::downgrade(source) as Weak<S>;

        debug!(
            id,
            name = source.name(),
            device_type = source.device_type(),
            "Publishing source"
        );
        self.entries.write().push(Entry {
            id,
            properties: extra,
            source: weak,
        });

        SourceRegistration {
            id,
            registry: Arc::downgrade(self),
            active: true,
        }
    }

    /// Remove a registration
    ///
    /// Returns false if it was already gone.
    pub fn unpublish(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if removed {
            debug!(id, "Source unpublished");
        }
        removed
    }

    /// First live source matching `filter`
    pub fn find(&self, filter: &PropertyFilter) -> Option<Arc<dyn MessageSource>> {
        let entries = self.entries.read();
        let found = entries
            .iter()
            .filter(|entry| filter.matches(&entry.properties))
            .find_map(|entry| entry.source.upgrade());
        trace!(?filter, found = found.is_some(), "Source lookup");
        found
    }

    /// First live source producing `device_type`
    pub fn find_by_device_type(&self, device_type: &str) -> Option<Arc<dyn MessageSource>> {
        self.find(&PropertyFilter::device_type(device_type))
    }

    /// Device types of live sources, in publication order without duplicates
    pub fn device_types(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut types: Vec<String> = Vec::new();
        for entry in entries.iter().filter(|e| e.source.strong_count() > 0) {
            if let Some(device_type) = entry.properties.get(PROP_DEVICE_TYPE) {
                if !types.contains(device_type) {
                    types.push(device_type.clone());
                }
            }
        }
        types
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.source.strong_count() > 0)
            .count()
    }

    /// True when no live source is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose source no longer exists, returning how many
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.source.strong_count() > 0);
        before - entries.len()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// Handle that keeps a registration alive
///
/// Dropping it unpublishes the source.
#[derive(Debug)]
#[must_use = "dropping the registration unpublishes the source"]
pub struct SourceRegistration {
    id: u64,
    registry: Weak<SourceRegistry>,
    active: bool,
}

impl SourceRegistration {
    /// Registration id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True until [`SourceRegistration::unpublish`]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Remove the source from the registry; later calls do nothing
    pub fn unpublish(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unpublish(self.id);
        }
    }
}

impl Drop for SourceRegistration {
    fn drop(&mut self) {
        self.unpublish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::source::LatestMessageSource;

    fn source(name: &str, device_type: &str) -> Arc<LatestMessageSource> {
        Arc::new(LatestMessageSource::new(name, device_type))
    }

    #[test]
    fn test_first_match_wins() {
        let registry = Arc::new(SourceRegistry::new());
        let first = source("First", "TRANSFORM");
        let second = source("Second", "TRANSFORM");
        let _a = registry.publish(&first);
        let _b = registry.publish(&second);

        let found = registry.find_by_device_type("TRANSFORM").unwrap();
        assert_eq!(found.name(), "First");
    }

    #[test]
    fn test_dropped_source_is_never_returned() {
        let registry = Arc::new(SourceRegistry::new());
        let first = source("First", "STATUS");
        let second = source("Second", "STATUS");
        let _a = registry.publish(&first);
        let _b = registry.publish(&second);

        drop(first);
        assert_eq!(registry.find_by_device_type("STATUS").unwrap().name(), "Second");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prune(), 1);
    }

    #[test]
    fn test_unpublish_is_idempotent() {
        let registry = Arc::new(SourceRegistry::new());
        let tracker = source("Tracker", "TRANSFORM");
        let mut registration = registry.publish(&tracker);

        registration.unpublish();
        registration.unpublish();
        assert!(!registration.is_active());
        assert!(!registry.unpublish(registration.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_unpublishes() {
        let registry = Arc::new(SourceRegistry::new());
        let tracker = source("Tracker", "TRANSFORM");
        {
            let _registration = registry.publish(&tracker);
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.find_by_device_type("TRANSFORM").is_none());
    }

    #[test]
    fn test_registration_outlives_registry() {
        let registry = Arc::new(SourceRegistry::new());
        let tracker = source("Tracker", "TRANSFORM");
        let mut registration = registry.publish(&tracker);
        drop(registry);
        registration.unpublish();
    }

    #[test]
    fn test_property_filter() {
        let registry = Arc::new(SourceRegistry::new());
        let left = source("Left", "TRANSFORM");
        let right = source("Right", "TRANSFORM");

        let mut props = Properties::new();
        props.insert("side".to_string(), "right".to_string());
        props.insert(PROP_NAME.to_string(), "Overridden".to_string());

        let _l = registry.publish(&left);
        let _r = registry.publish_with_properties(&right, props);

        let filter = PropertyFilter::device_type("TRANSFORM").with("side", "right");
        assert_eq!(registry.find(&filter).unwrap().name(), "Right");

        let by_name = PropertyFilter::new().with(PROP_NAME, "Right");
        assert!(registry.find(&by_name).is_some());
        assert!(registry.find(&PropertyFilter::new().with(PROP_NAME, "Overridden")).is_none());
    }

    #[test]
    fn test_device_types_deduplicated() {
        let registry = Arc::new(SourceRegistry::new());
        let sources = [
            source("A", "TRANSFORM"),
            source("B", "STATUS"),
            source("C", "TRANSFORM"),
        ];
        let _regs: Vec<_> = sources.iter().map(|s| registry.publish(s)).collect();
        assert_eq!(registry.device_types(), vec!["TRANSFORM", "STATUS"]);
    }

    #[test]
    fn test_concurrent_publish_and_lookup() {
        let registry = Arc::new(SourceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let s = source(&format!("S{i}"), "TRANSFORM");
                    for _ in 0..100 {
                        let registration = registry.publish(&s);
                        assert!(registry.find_by_device_type("TRANSFORM").is_some());
                        drop(registration);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
