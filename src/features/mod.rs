//! Feature services built on the sub-collection stores.
//!
//! Each feature owns one key of the owner's record. All of them share a
//! single backend, clock, reference validator and lock table, since every
//! feature writes the same per-owner document.

pub mod collections;
pub mod favorite_places;
pub mod favorite_prompts;
pub mod history;
pub mod preferences;

pub use collections::{Collection, Collections, COLLECTIONS_KEY};
pub use favorite_places::{FavoritePlace, FavoritePlaces, FAVORITE_PLACES_KEY};
pub use favorite_prompts::{FavoritePrompt, FavoritePrompts, FAVORITE_PROMPTS_KEY};
pub use history::{History, HistoryEntry, HISTORY_KEY};
pub use preferences::{Preferences, PreferencesPatch, UserPreferences, PREFERENCES_KEY};

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::storage::RecordBackend;
use crate::store::{Clock, ConsistencyMode, OwnerLocks, ReferenceValidator, StoreError, StoreResult};

/// Default cap on history entries per owner
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 100;

/// Sort direction for ordered listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        self == SortOrder::Descending
    }
}

/// Feature-level tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    /// FIFO cap on history entries
    pub history_max_entries: usize,
    /// How concurrent writers to one owner are handled
    pub consistency: ConsistencyMode,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            history_max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            consistency: ConsistencyMode::BestEffort,
        }
    }
}

impl FeatureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_max_entries(mut self, max: usize) -> Self {
        self.history_max_entries = max;
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyMode) -> Self {
        self.consistency = consistency;
        self
    }
}

/// Everything a feature service needs, shared across features
#[derive(Clone)]
pub struct FeatureContext {
    pub backend: Arc<dyn RecordBackend>,
    pub validator: Arc<dyn ReferenceValidator>,
    pub clock: Arc<dyn Clock>,
    pub locks: Option<OwnerLocks>,
}

/// All feature services for one deployment
pub struct ProfileServices {
    pub favorite_places: FavoritePlaces,
    pub favorite_prompts: FavoritePrompts,
    pub history: History,
    pub collections: Collections,
    pub preferences: Preferences,
}

impl ProfileServices {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        validator: Arc<dyn ReferenceValidator>,
        clock: Arc<dyn Clock>,
        config: FeatureConfig,
    ) -> Self {
        // One lock table for every feature: they all write the same record
        let ctx = FeatureContext {
            backend,
            validator,
            clock,
            locks: config.consistency.owner_locks(),
        };

        info!(
            "Profile services ready (consistency: {:?}, history cap: {})",
            config.consistency, config.history_max_entries
        );

        Self {
            favorite_places: FavoritePlaces::new(&ctx),
            favorite_prompts: FavoritePrompts::new(&ctx),
            history: History::new(&ctx, config.history_max_entries),
            collections: Collections::new(&ctx),
            preferences: Preferences::new(&ctx),
        }
    }
}

/// Turn a store-level "absent" into a `NotFound` error
pub(crate) fn found<T>(value: Option<T>, key: &str, id: &str) -> StoreResult<T> {
    value.ok_or_else(|| StoreError::not_found(key, id))
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be blank", field));
    }
    Ok(())
}
