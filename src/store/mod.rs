//! Sub-collection stores layered over whole-document records.
//!
//! A profile record is a JSON object; each feature owns one top-level key
//! (a sub-collection) holding either a list of items or a single settings
//! object. Because the backend only supports whole-document reads and
//! writes, every mutation here is a read-modify-write cycle:
//!
//! 1. `get` the owner's record
//! 2. decode the feature's key into typed values
//! 3. apply a pure in-memory transformation
//! 4. `set` the record with that key replaced, only if something changed
//!
//! Consistency: without [`OwnerLocks`] two concurrent cycles on the same
//! owner are last-writer-wins (the later `set` discards the earlier one's
//! effect). With [`OwnerLocks`] shared by every store, cycles are serialized
//! per owner within this process; different owners never wait on each other.

pub mod clock;
pub mod codec;
pub mod collection;
pub mod locks;
pub mod policy;
pub mod settings;
pub mod undo;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{AddOutcome, CollectionItem, CollectionStore};
pub use locks::OwnerLocks;
pub use policy::{CollectionPolicy, DedupPolicy, EvictionPolicy};
pub use settings::{Settings, SettingsStore};
pub use undo::TimeRange;
pub use validator::{AcceptAll, KnownReferences, ReferenceValidator};

use thiserror::Error;

use crate::storage::BackendError;

/// Errors that can occur during store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No entry '{id}' in {key}")]
    NotFound { key: String, id: String },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Corrupt record under '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            key: key.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// How concurrent writers to the same owner are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyMode {
    /// Unsynchronized read-modify-write, last writer wins
    #[default]
    BestEffort,
    /// One read-modify-write cycle at a time per owner, in this process
    SerializedPerOwner,
}

impl ConsistencyMode {
    /// Lock table matching this mode, to be shared by every store
    pub fn owner_locks(self) -> Option<OwnerLocks> {
        match self {
            ConsistencyMode::BestEffort => None,
            ConsistencyMode::SerializedPerOwner => Some(OwnerLocks::new()),
        }
    }
}
