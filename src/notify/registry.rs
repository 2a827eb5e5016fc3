//! Subscriber registry

use std::collections::BTreeSet;
use std::sync::RwLock;

/// Append-only set of subscriber chat ids
///
/// Subscribers are never removed while the process runs. Readers take a
/// snapshot so that delivery never holds the lock across an await.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeSet<String>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        for id in ids {
            registry.add(id);
        }
        registry
    }

    /// Adds a subscriber, returning false if it was already registered
    pub fn add(&self, id: impl Into<String>) -> bool {
        let id = id.into();
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.insert(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id)
    }

    /// Current subscribers in a stable order
    pub fn snapshot(&self) -> Vec<String> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
