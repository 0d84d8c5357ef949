//! Generic list sub-collection over a whole-document record.
//!
//! Every mutating operation is one read-modify-write cycle: read the record,
//! decode the list, transform it in memory, and write the record back only
//! when the list changed. Reads decode once and never write.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::codec;
use super::undo::{self, TimeRange};
use super::{Clock, CollectionPolicy, OwnerLocks, StoreError, StoreResult};
use crate::storage::RecordBackend;

/// An element of a list sub-collection
pub trait CollectionItem: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Identity key, unique within the sub-collection when dedup is enabled
    fn key(&self) -> String;

    /// Creation timestamp; preserved across updates
    fn created_at(&self) -> Option<DateTime<Utc>>;

    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Payload checks run before any backend call
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Re-attach fields of `previous` that an update must not reset
    fn retain_immutable(&mut self, previous: &Self) {
        if self.created_at().is_none() {
            if let Some(at) = previous.created_at() {
                self.set_created_at(at);
            }
        }
    }
}

/// Result of [`CollectionStore::add`]
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome<T> {
    /// Appended; `evicted` holds items dropped to make room, oldest first
    Inserted { item: T, evicted: Vec<T> },
    /// An item with the same key exists and dedup is enabled
    Duplicate,
    /// The collection's size limit is zero
    Rejected,
}

impl<T> AddOutcome<T> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted { .. })
    }

    /// The stored item, if one was inserted
    pub fn inserted(self) -> Option<T> {
        match self {
            AddOutcome::Inserted { item, .. } => Some(item),
            _ => None,
        }
    }
}

/// What a transformation did to the decoded list
enum Change {
    Unchanged,
    Modified,
}

/// Store for one named list sub-collection of type `T`
pub struct CollectionStore<T> {
    backend: Arc<dyn RecordBackend>,
    key: String,
    policy: CollectionPolicy,
    clock: Arc<dyn Clock>,
    locks: Option<OwnerLocks>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CollectionItem> CollectionStore<T> {
    /// Create a store for `key` with the given policies and time source
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        key: impl Into<String>,
        policy: CollectionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            policy,
            clock,
            locks: None,
            _marker: PhantomData,
        }
    }

    /// Serialize read-modify-write cycles per owner through a shared lock table
    pub fn with_locks(mut self, locks: Option<OwnerLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The sub-collection key inside the owner's record
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn policy(&self) -> &CollectionPolicy {
        &self.policy
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Append an item, honoring dedup and eviction
    pub async fn add(&self, owner: &str, mut item: T) -> StoreResult<AddOutcome<T>> {
        if item.created_at().is_none() {
            item.set_created_at(self.clock.now());
        }
        let item_key = validate_item(&item)?;

        if self.policy.eviction.rejects_all() {
            warn!("{} is capped at zero items, rejecting add for {}", self.key, owner);
            return Ok(AddOutcome::Rejected);
        }

        let policy = self.policy;
        let dup_key = item_key.clone();
        let outcome = self
            .read_modify_write(owner, move |items| {
                if policy.dedup.is_duplicate(items, &dup_key) {
                    return Ok((AddOutcome::Duplicate, Change::Unchanged));
                }
                let evicted = policy.eviction.make_room(items);
                items.push(item.clone());
                Ok((AddOutcome::Inserted { item, evicted }, Change::Modified))
            })
            .await?;

        match &outcome {
            AddOutcome::Inserted { evicted, .. } => {
                if !evicted.is_empty() {
                    debug!(
                        "Evicted {} oldest item(s) from {} for {}",
                        evicted.len(),
                        self.key,
                        owner
                    );
                }
                info!("Added {} to {} for {}", item_key, self.key, owner);
            }
            AddOutcome::Duplicate => {
                warn!("{} already contains {} for {}", self.key, item_key, owner);
            }
            AddOutcome::Rejected => {}
        }
        Ok(outcome)
    }

    /// Replace the item with identity `key`. Returns `None` if there is none.
    ///
    /// The original creation timestamp is kept unless `value` carries one.
    pub async fn update(&self, owner: &str, key: &str, mut value: T) -> StoreResult<Option<T>> {
        validate_key(key)?;
        value.validate().map_err(StoreError::Validation)?;
        if value.key() != key {
            return Err(StoreError::validation(format!(
                "identity key '{}' does not match target '{}'",
                value.key(),
                key
            )));
        }

        let target = key.to_string();
        let updated = self
            .read_modify_write(owner, move |items| {
                let Some(idx) = items.iter().position(|item| item.key() == target) else {
                    return Ok((None, Change::Unchanged));
                };
                value.retain_immutable(&items[idx]);
                items[idx] = value.clone();
                Ok((Some(value), Change::Modified))
            })
            .await?;

        if updated.is_some() {
            info!("Updated {} in {} for {}", key, self.key, owner);
        } else {
            debug!("No {} in {} for {} to update", key, self.key, owner);
        }
        Ok(updated)
    }

    /// Mutate the item with identity `key` in place.
    ///
    /// The mutator returns whether it changed anything; nothing is written
    /// otherwise. Identity key and creation timestamp cannot be changed this
    /// way. Returns the item as stored, or `None` if there is none.
    pub async fn modify<F>(&self, owner: &str, key: &str, mutator: F) -> StoreResult<Option<T>>
    where
        F: FnOnce(&mut T) -> bool + Send,
    {
        validate_key(key)?;

        let target = key.to_string();
        self.read_modify_write(owner, move |items| {
            let Some(idx) = items.iter().position(|item| item.key() == target) else {
                return Ok((None, Change::Unchanged));
            };
            let original = items[idx].clone();
            let mut candidate = original.clone();
            if !mutator(&mut candidate) {
                return Ok((Some(original), Change::Unchanged));
            }
            if candidate.key() != original.key() {
                return Err(StoreError::validation("identity key cannot be modified"));
            }
            if let Some(at) = original.created_at() {
                candidate.set_created_at(at);
            }
            candidate.validate().map_err(StoreError::Validation)?;
            items[idx] = candidate.clone();
            Ok((Some(candidate), Change::Modified))
        })
        .await
    }

    /// Remove the item with identity `key`. Returns the removed item, if any.
    pub async fn remove(&self, owner: &str, key: &str) -> StoreResult<Option<T>> {
        validate_key(key)?;

        let target = key.to_string();
        let removed = self
            .read_modify_write(owner, move |items| {
                match items.iter().position(|item| item.key() == target) {
                    Some(idx) => Ok((Some(items.remove(idx)), Change::Modified)),
                    None => Ok((None, Change::Unchanged)),
                }
            })
            .await?;

        if removed.is_some() {
            info!("Removed {} from {} for {}", key, self.key, owner);
        }
        Ok(removed)
    }

    /// Drop the whole sub-collection. Returns whether the key was present.
    ///
    /// The stored value is not decoded, so this also discards a corrupt list.
    pub async fn clear(&self, owner: &str) -> StoreResult<bool> {
        let _guard = self.lock(owner).await;

        let mut doc = self.backend.get(owner).await?;
        if !doc.contains_key(&self.key) {
            return Ok(false);
        }
        codec::write(&mut doc, &self.key, None);
        self.backend.set(owner, doc).await?;

        info!("Cleared {} for {}", self.key, owner);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------

    /// Remove the most recently added item
    pub async fn rollback_last(&self, owner: &str) -> StoreResult<Option<T>> {
        let removed = self
            .read_modify_write(owner, |items| {
                let removed = undo::rollback_last(items);
                let change = changed_if(removed.is_some());
                Ok((removed, change))
            })
            .await?;

        if let Some(item) = &removed {
            info!("Rolled back {} from {} for {}", item.key(), self.key, owner);
        }
        Ok(removed)
    }

    /// Remove the most recently added item matching `predicate`
    pub async fn rollback_last_matching<P>(&self, owner: &str, predicate: P) -> StoreResult<Option<T>>
    where
        P: Fn(&T) -> bool + Send,
    {
        let removed = self
            .read_modify_write(owner, move |items| {
                let removed = undo::rollback_last_matching(items, predicate);
                let change = changed_if(removed.is_some());
                Ok((removed, change))
            })
            .await?;

        if let Some(item) = &removed {
            info!("Rolled back {} from {} for {}", item.key(), self.key, owner);
        }
        Ok(removed)
    }

    /// Remove every item created within `[start, end]` in one write
    pub async fn rollback_range(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<T>> {
        let range = TimeRange::new(start, end)?;

        let removed = self
            .read_modify_write(owner, move |items| {
                let removed = undo::rollback_range(items, &range);
                let change = changed_if(!removed.is_empty());
                Ok((removed, change))
            })
            .await?;

        info!(
            "Rolled back {} item(s) from {} for {}",
            removed.len(),
            self.key,
            owner
        );
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// All items in insertion order
    pub async fn list(&self, owner: &str) -> StoreResult<Vec<T>> {
        let doc = self.backend.get(owner).await?;
        codec::decode_list(&doc, &self.key)
    }

    /// The item with identity `key`
    pub async fn find(&self, owner: &str, key: &str) -> StoreResult<Option<T>> {
        Ok(self
            .list(owner)
            .await?
            .into_iter()
            .find(|item| item.key() == key))
    }

    /// Items matching `predicate`, in insertion order
    pub async fn search<P>(&self, owner: &str, predicate: P) -> StoreResult<Vec<T>>
    where
        P: Fn(&T) -> bool + Send,
    {
        let mut items = self.list(owner).await?;
        items.retain(|item| predicate(item));
        Ok(items)
    }

    /// All items ordered by `compare` (stable); reversed when `descending`
    pub async fn sort_by<C>(&self, owner: &str, compare: C, descending: bool) -> StoreResult<Vec<T>>
    where
        C: Fn(&T, &T) -> Ordering + Send,
    {
        let mut items = self.list(owner).await?;
        if descending {
            items.sort_by(|a, b| compare(b, a));
        } else {
            items.sort_by(|a, b| compare(a, b));
        }
        Ok(items)
    }

    pub async fn count(&self, owner: &str) -> StoreResult<usize> {
        Ok(self.list(owner).await?.len())
    }

    pub async fn is_member(&self, owner: &str, key: &str) -> StoreResult<bool> {
        Ok(self.find(owner, key).await?.is_some())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn lock(&self, owner: &str) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(owner).await),
            None => None,
        }
    }

    async fn read_modify_write<R, F>(&self, owner: &str, transform: F) -> StoreResult<R>
    where
        R: Send,
        F: FnOnce(&mut Vec<T>) -> StoreResult<(R, Change)> + Send,
    {
        let _guard = self.lock(owner).await;

        let mut doc = self.backend.get(owner).await?;
        let mut items: Vec<T> = codec::decode_list(&doc, &self.key)?;

        let (result, change) = transform(&mut items)?;
        if let Change::Modified = change {
            let value = codec::encode(&self.key, &items)?;
            codec::write(&mut doc, &self.key, Some(value));
            self.backend.set(owner, doc).await?;
        }
        Ok(result)
    }
}

fn changed_if(changed: bool) -> Change {
    if changed {
        Change::Modified
    } else {
        Change::Unchanged
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::validation("identity key must not be blank"));
    }
    Ok(())
}

fn validate_item<T: CollectionItem>(item: &T) -> StoreResult<String> {
    let key = item.key();
    validate_key(&key)?;
    item.validate().map_err(StoreError::Validation)?;
    Ok(key)
}
