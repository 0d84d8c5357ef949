//! Single-object sub-collection with defaults.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

use super::codec;
use super::{OwnerLocks, StoreError, StoreResult};
use crate::storage::RecordBackend;

/// A settings object stored under one key of the owner's record
pub trait Settings: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Store for one settings object of type `S`
pub struct SettingsStore<S> {
    backend: Arc<dyn RecordBackend>,
    key: String,
    locks: Option<OwnerLocks>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Settings> SettingsStore<S> {
    pub fn new(backend: Arc<dyn RecordBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            locks: None,
            _marker: PhantomData,
        }
    }

    pub fn with_locks(mut self, locks: Option<OwnerLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored settings, or the defaults if nothing is stored
    pub async fn get(&self, owner: &str) -> StoreResult<S> {
        Ok(self.get_stored(owner).await?.unwrap_or_default())
    }

    /// Stored settings, `None` if the key is absent
    pub async fn get_stored(&self, owner: &str) -> StoreResult<Option<S>> {
        let doc = self.backend.get(owner).await?;
        codec::decode_object(&doc, &self.key)
    }

    /// Replace the whole settings object
    pub async fn set(&self, owner: &str, settings: S) -> StoreResult<S> {
        settings.validate().map_err(StoreError::Validation)?;
        let value = codec::encode(&self.key, &settings)?;

        let _guard = self.lock(owner).await;
        let mut doc = self.backend.get(owner).await?;
        codec::write(&mut doc, &self.key, Some(value));
        self.backend.set(owner, doc).await?;

        info!("Stored {} for {}", self.key, owner);
        Ok(settings)
    }

    /// Change part of the settings, starting from the stored value or the defaults.
    ///
    /// Nothing is written when the result equals what was read.
    pub async fn update_field<F>(&self, owner: &str, apply: F) -> StoreResult<S>
    where
        F: FnOnce(&mut S) + Send,
    {
        let _guard = self.lock(owner).await;

        let mut doc = self.backend.get(owner).await?;
        let stored: Option<S> = codec::decode_object(&doc, &self.key)?;
        let before = match &stored {
            Some(settings) => Some(codec::encode(&self.key, settings)?),
            None => None,
        };

        let mut settings = stored.unwrap_or_default();
        apply(&mut settings);
        settings.validate().map_err(StoreError::Validation)?;

        let after = codec::encode(&self.key, &settings)?;
        if before.as_ref() != Some(&after) {
            codec::write(&mut doc, &self.key, Some(after));
            self.backend.set(owner, doc).await?;
            info!("Updated {} for {}", self.key, owner);
        }
        Ok(settings)
    }

    /// Remove the settings object. Returns whether one was stored.
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

    async fn lock(&self, owner: &str) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(owner).await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Document, InMemoryBackend};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Display {
        theme: String,
        font_size: u32,
    }

    impl Default for Display {
        fn default() -> Self {
            Self {
                theme: "light".to_string(),
                font_size: 14,
            }
        }
    }

    impl Settings for Display {
        fn validate(&self) -> Result<(), String> {
            if self.font_size == 0 {
                return Err("font size must be positive".to_string());
            }
            Ok(())
        }
    }

    fn store() -> (InMemoryBackend, SettingsStore<Display>) {
        let backend = InMemoryBackend::new();
        let store = SettingsStore::new(Arc::new(backend.clone()), "display");
        (backend, store)
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let (_backend, store) = store();
        assert_eq!(store.get("u1").await.unwrap(), Display::default());
        assert!(store.get_stored("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_backend, store) = store();
        let dark = Display {
            theme: "dark".to_string(),
            font_size: 16,
        };

        store.set("u1", dark.clone()).await.unwrap();
        assert_eq!(store.get("u1").await.unwrap(), dark);
    }

    #[tokio::test]
    async fn test_partial_object_fills_defaults() {
        let (backend, store) = store();
        let mut doc = Document::new();
        doc.insert("display".to_string(), json!({ "theme": "dark", "extra": 1 }));
        backend.insert("u1", doc);

        let display = store.get("u1").await.unwrap();
        assert_eq!(display.theme, "dark");
        assert_eq!(display.font_size, 14);
    }

    #[tokio::test]
    async fn test_update_field_starts_from_defaults() {
        let (backend, store) = store();

        let updated = store.update_field("u1", |d| d.font_size = 20).await.unwrap();
        assert_eq!(updated.theme, "light");
        assert_eq!(updated.font_size, 20);

        let doc = backend.get("u1").await.unwrap();
        assert_eq!(doc["display"], json!({ "theme": "light", "fontSize": 20 }));
    }

    #[tokio::test]
    async fn test_invalid_settings_not_written() {
        let (backend, store) = store();

        let result = store.update_field("u1", |d| d.font_size = 0).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let (backend, store) = store();
        let mut doc = Document::new();
        doc.insert("favorites".to_string(), json!([]));
        backend.insert("u1", doc);

        assert!(!store.clear("u1").await.unwrap());
        store.set("u1", Display::default()).await.unwrap();
        assert!(store.clear("u1").await.unwrap());

        let doc = backend.get("u1").await.unwrap();
        assert!(!doc.contains_key("display"));
        assert!(doc.contains_key("favorites"));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let (backend, store) = store();
        let mut doc = Document::new();
        doc.insert("display".to_string(), json!(["not", "an", "object"]));
        backend.insert("u1", doc);

        assert!(matches!(
            store.get("u1").await,
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
