//! Environment-driven server configuration.

use std::str::FromStr;
use thiserror::Error;

use crate::features::{FeatureConfig, DEFAULT_HISTORY_MAX_ENTRIES};
use crate::storage::StorageConfig;
use crate::store::ConsistencyMode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },

    #[error("Unknown backend '{0}' (expected 'memory' or 'sled')")]
    UnknownBackend(String),
}

/// Where owner records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Process memory, lost on restart
    Memory,
    /// Embedded sled database
    #[default]
    Sled,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sled" => Ok(BackendKind::Sled),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub backend: BackendKind,
    pub storage: StorageConfig,
    pub history_max_entries: usize,
    pub serialize_writes: bool,
    /// Place ids accepted by the reference validator; empty accepts all
    pub known_places: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            backend: BackendKind::default(),
            storage: StorageConfig::default(),
            history_max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            serialize_writes: false,
            known_places: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable lookup, falling back to defaults for unset variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(backend) = lookup("PROFILE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup("STORAGE_PATH") {
            config.storage.path = path;
        }
        if let Some(max) = lookup("PROFILE_HISTORY_MAX_ENTRIES") {
            config.history_max_entries = parse_var("PROFILE_HISTORY_MAX_ENTRIES", &max)?;
        }
        if let Some(serialize) = lookup("PROFILE_SERIALIZE_WRITES") {
            config.serialize_writes = parse_var("PROFILE_SERIALIZE_WRITES", &serialize)?;
        }
        if let Some(places) = lookup("PROFILE_KNOWN_PLACES") {
            config.known_places = places
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_history_max_entries(mut self, max: usize) -> Self {
        self.history_max_entries = max;
        self
    }

    pub fn with_serialized_writes(mut self, serialize: bool) -> Self {
        self.serialize_writes = serialize;
        self
    }

    pub fn consistency(&self) -> ConsistencyMode {
        if self.serialize_writes {
            ConsistencyMode::SerializedPerOwner
        } else {
            ConsistencyMode::BestEffort
        }
    }

    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig::new()
            .with_history_max_entries(self.history_max_entries)
            .with_consistency(self.consistency())
    }
}

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}
