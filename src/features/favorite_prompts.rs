//! Favorite prompts: saved prompt texts keyed by a generated id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{found, require_text, FeatureContext};
use crate::store::{AddOutcome, CollectionItem, CollectionPolicy, CollectionStore, StoreError, StoreResult};

pub const FAVORITE_PROMPTS_KEY: &str = "favorite_prompts";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritePrompt {
    pub prompt_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl CollectionItem for FavoritePrompt {
    fn key(&self) -> String {
        self.prompt_id.clone()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.added_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.added_at = Some(at);
    }

    fn validate(&self) -> Result<(), String> {
        require_text("content", &self.content)
    }
}

/// Favorite prompts of each owner
pub struct FavoritePrompts {
    store: CollectionStore<FavoritePrompt>,
}

impl FavoritePrompts {
    pub fn new(ctx: &FeatureContext) -> Self {
        let store = CollectionStore::new(
            ctx.backend.clone(),
            FAVORITE_PROMPTS_KEY,
            CollectionPolicy::new(),
            ctx.clock.clone(),
        )
        .with_locks(ctx.locks.clone());

        Self { store }
    }

    /// Save a prompt under a freshly generated id
    pub async fn add(
        &self,
        owner: &str,
        content: impl Into<String>,
        added_at: Option<DateTime<Utc>>,
    ) -> StoreResult<FavoritePrompt> {
        let prompt = FavoritePrompt {
            prompt_id: Uuid::new_v4().to_string(),
            content: content.into(),
            added_at,
        };
        let prompt_id = prompt.prompt_id.clone();

        match self.store.add(owner, prompt).await? {
            AddOutcome::Inserted { item, .. } => Ok(item),
            AddOutcome::Duplicate => Err(StoreError::validation(format!(
                "prompt id {} already exists",
                prompt_id
            ))),
            AddOutcome::Rejected => Err(StoreError::validation("favorite prompts are full")),
        }
    }

    /// Replace a prompt's content. `added_at` is kept unless a new one is given.
    pub async fn update(
        &self,
        owner: &str,
        prompt_id: &str,
        content: impl Into<String>,
        added_at: Option<DateTime<Utc>>,
    ) -> StoreResult<FavoritePrompt> {
        let prompt = FavoritePrompt {
            prompt_id: prompt_id.to_string(),
            content: content.into(),
            added_at,
        };
        let updated = self.store.update(owner, prompt_id, prompt).await?;
        found(updated, FAVORITE_PROMPTS_KEY, prompt_id)
    }

    pub async fn remove(&self, owner: &str, prompt_id: &str) -> StoreResult<FavoritePrompt> {
        let removed = self.store.remove(owner, prompt_id).await?;
        found(removed, FAVORITE_PROMPTS_KEY, prompt_id)
    }

    pub async fn list(&self, owner: &str) -> StoreResult<Vec<FavoritePrompt>> {
        self.store.list(owner).await
    }

    pub async fn get(&self, owner: &str, prompt_id: &str) -> StoreResult<FavoritePrompt> {
        let prompt = self.store.find(owner, prompt_id).await?;
        found(prompt, FAVORITE_PROMPTS_KEY, prompt_id)
    }

    pub async fn clear(&self, owner: &str) -> StoreResult<bool> {
        self.store.clear(owner).await
    }

    pub async fn is_favorite(&self, owner: &str, prompt_id: &str) -> StoreResult<bool> {
        self.store.is_member(owner, prompt_id).await
    }

    pub async fn count(&self, owner: &str) -> StoreResult<usize> {
        self.store.count(owner).await
    }
}
