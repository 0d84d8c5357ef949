//! Per-feature insertion policies: size bound and duplicate handling.

use super::CollectionItem;

/// FIFO bound on a collection's size.
///
/// Items are kept in insertion order, so the oldest item is always at index
/// 0. Reading or updating an item does not refresh its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictionPolicy {
    max_size: Option<usize>,
}

impl EvictionPolicy {
    /// No size bound
    pub fn unbounded() -> Self {
        Self { max_size: None }
    }

    /// Keep at most `max_size` items; `0` rejects every add
    pub fn max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.max_size
    }

    /// Check if this policy refuses all inserts
    pub fn rejects_all(&self) -> bool {
        self.max_size == Some(0)
    }

    /// Evict oldest items until one more fits. Returns the evicted items, oldest first.
    pub fn make_room<T>(&self, items: &mut Vec<T>) -> Vec<T> {
        match self.max_size {
            Some(max) if max > 0 && items.len() >= max => {
                let excess = items.len() + 1 - max;
                items.drain(..excess).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Whether adding an existing identity key is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Add of an existing key is a no-op
    #[default]
    Enabled,
    /// Keys may repeat
    Disabled,
}

impl DedupPolicy {
    /// Check if inserting `key` should be skipped
    pub fn is_duplicate<T: CollectionItem>(&self, items: &[T], key: &str) -> bool {
        match self {
            DedupPolicy::Enabled => items.iter().any(|item| item.key() == key),
            DedupPolicy::Disabled => false,
        }
    }
}

/// Policies applied by a [`super::CollectionStore`] on add
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionPolicy {
    pub dedup: DedupPolicy,
    pub eviction: EvictionPolicy,
}

impl CollectionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.eviction = EvictionPolicy::max_size(max_size);
        self
    }
}
