//! User preferences: a single settings object with defaults.

use serde::{Deserialize, Serialize};

use super::{require_text, FeatureContext};
use crate::store::{Settings, SettingsStore, StoreError, StoreResult};

pub const PREFERENCES_KEY: &str = "preferences";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub language: String,
    pub categories: Vec<String>,
    pub timezone: String,
    pub notifications_enabled: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            categories: Vec::new(),
            timezone: "UTC".to_string(),
            notifications_enabled: true,
        }
    }
}

impl Settings for UserPreferences {
    fn validate(&self) -> Result<(), String> {
        require_text("language", &self.language)?;
        require_text("timezone", &self.timezone)?;
        self.categories
            .iter()
            .try_for_each(|category| require_text("category", category))
    }
}

/// Partial change to preferences; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub language: Option<String>,
    pub categories: Option<Vec<String>>,
    pub timezone: Option<String>,
    pub notifications_enabled: Option<bool>,
}

impl PreferencesPatch {
    fn validate(&self) -> Result<(), String> {
        if let Some(language) = &self.language {
            require_text("language", language)?;
        }
        if let Some(timezone) = &self.timezone {
            require_text("timezone", timezone)?;
        }
        if let Some(categories) = &self.categories {
            validate_categories(categories)?;
        }
        Ok(())
    }

    fn apply(self, prefs: &mut UserPreferences) {
        if let Some(language) = self.language {
            prefs.language = language;
        }
        if let Some(categories) = self.categories {
            prefs.categories = categories;
        }
        if let Some(timezone) = self.timezone {
            prefs.timezone = timezone;
        }
        if let Some(enabled) = self.notifications_enabled {
            prefs.notifications_enabled = enabled;
        }
    }
}

pub struct Preferences {
    store: SettingsStore<UserPreferences>,
}

impl Preferences {
    pub fn new(ctx: &FeatureContext) -> Self {
        let store = SettingsStore::new(ctx.backend.clone(), PREFERENCES_KEY).with_locks(ctx.locks.clone());
        Self { store }
    }

    /// Stored preferences, or the defaults
    pub async fn get(&self, owner: &str) -> StoreResult<UserPreferences> {
        self.store.get(owner).await
    }

    pub async fn set(&self, owner: &str, preferences: UserPreferences) -> StoreResult<UserPreferences> {
        self.store.set(owner, preferences).await
    }

    pub async fn update_language(&self, owner: &str, language: &str) -> StoreResult<UserPreferences> {
        require_text("language", language).map_err(StoreError::Validation)?;
        let language = language.to_string();
        self.store
            .update_field(owner, move |prefs| prefs.language = language)
            .await
    }

    pub async fn update_categories(&self, owner: &str, categories: Vec<String>) -> StoreResult<UserPreferences> {
        validate_categories(&categories).map_err(StoreError::Validation)?;
        self.store
            .update_field(owner, move |prefs| prefs.categories = categories)
            .await
    }

    pub async fn update_timezone(&self, owner: &str, timezone: &str) -> StoreResult<UserPreferences> {
        require_text("timezone", timezone).map_err(StoreError::Validation)?;
        let timezone = timezone.to_string();
        self.store
            .update_field(owner, move |prefs| prefs.timezone = timezone)
            .await
    }

    pub async fn update_notifications(&self, owner: &str, enabled: bool) -> StoreResult<UserPreferences> {
        self.store
            .update_field(owner, move |prefs| prefs.notifications_enabled = enabled)
            .await
    }

    /// Apply several field changes in one write
    pub async fn apply(&self, owner: &str, patch: PreferencesPatch) -> StoreResult<UserPreferences> {
        patch.validate().map_err(StoreError::Validation)?;
        self.store.update_field(owner, move |prefs| patch.apply(prefs)).await
    }

    /// Forget stored preferences; later reads return the defaults
    pub async fn clear(&self, owner: &str) -> StoreResult<bool> {
        self.store.clear(owner).await
    }
}

fn validate_categories(categories: &[String]) -> Result<(), String> {
    if categories.is_empty() {
        return Err("categories must not be empty".to_string());
    }
    categories
        .iter()
        .try_for_each(|category| require_text("category", category))
}
