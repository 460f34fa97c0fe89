//! Capability type produced by feature detection.

use serde::Serialize;
use std::collections::BTreeMap;

/// An optional hardware or runtime feature and what is known about it.
///
/// `present` reflects the device itself; `metadata` is best-effort
/// introspection and may be empty even when the capability is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    /// Capability tag (e.g., "gpu").
    pub tag: String,
    /// Whether the capability was detected.
    pub present: bool,
    /// Introspected details (driver version, device name, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Capability {
    /// A capability that was found.
    pub fn present(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            present: true,
            metadata: BTreeMap::new(),
        }
    }

    /// A capability that was not found (or could not be confirmed).
    pub fn absent(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            present: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The capabilities detected for one run, keyed by tag.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    capabilities: BTreeMap<String, Capability>,
}

impl CapabilitySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a capability.
    pub fn insert(&mut self, capability: Capability) {
        self.capabilities
            .insert(capability.tag.clone(), capability);
    }

    /// Look up a capability by tag.
    pub fn get(&self, tag: &str) -> Option<&Capability> {
        self.capabilities.get(tag)
    }

    /// Whether `tag` was detected as present. Unknown tags are absent.
    pub fn has(&self, tag: &str) -> bool {
        self.get(tag).is_some_and(|c| c.present)
    }

    /// Iterate capabilities in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    /// Number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}
