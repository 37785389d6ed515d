use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use getset::Getters;
use log::LevelFilter;
use marvel_client::auth::Auth;
use marvel_client::cache::CacheConfig;
use marvel_client::storage::{StorageError, StorageOrigin};
use marvel_client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_CHARACTER_LIMIT};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging;

/// Environment variables override the file, e.g. `MARVEL_API__AUTH__KEY`.
pub const ENV_PREFIX: &str = "MARVEL_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] figment::Error),
    #[error("cache.expiration_hours must be a positive number of hours in range, got {0}")]
    Expiration(i64),
    #[error("unknown log_level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, Getters)]
#[get = "pub"]
pub struct Config {
    api: ApiConfig,
    #[serde(default)]
    cache: CacheSettings,
    #[serde(default)]
    search: SearchSettings,
    #[serde(default)]
    storage: StorageSettings,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters)]
#[get = "pub"]
pub struct ApiConfig {
    #[serde_inline_default(DEFAULT_BASE_URL.to_string())]
    base_url: String,
    auth: Auth,
    #[serde_inline_default(DEFAULT_CHARACTER_LIMIT)]
    character_limit: u32,
    #[serde_inline_default(30)]
    request_timeout_secs: u64,
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters)]
#[get = "pub"]
pub struct CacheSettings {
    #[serde_inline_default(24)]
    expiration_hours: i64,
    #[serde_inline_default(true)]
    enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiration_hours: 24,
            enabled: true,
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters)]
#[get = "pub"]
pub struct SearchSettings {
    #[serde_inline_default(300)]
    debounce_ms: u64,
    #[serde_inline_default(20)]
    comics_limit: u32,
    #[serde_inline_default("onsaleDate".to_string())]
    comics_order_by: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            comics_limit: 20,
            comics_order_by: "onsaleDate".to_string(),
        }
    }
}

/// Where favorites and cached responses live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageSettings {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
}

impl Config {
    /// Load from an optional YAML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::from(Yaml::string(yaml)))
    }

    /// Extract and check the values serde cannot.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.cache_config()?;
        config.log_filter()?;
        Ok(config)
    }

    pub fn new(auth: Auth) -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                auth,
                character_limit: DEFAULT_CHARACTER_LIMIT,
                request_timeout_secs: 30,
            },
            cache: CacheSettings::default(),
            search: SearchSettings::default(),
            storage: StorageSettings::default(),
            log_level: default_log_level(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = storage;
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api.base_url.clone(), self.api.auth.clone())
            .with_character_limit(self.api.character_limit)
            .with_request_timeout(Duration::from_secs(self.api.request_timeout_secs))
    }

    pub fn cache_config(&self) -> Result<CacheConfig, ConfigError> {
        let hours = self.cache.expiration_hours;
        let expiration = chrono::Duration::try_hours(hours)
            .filter(|_| hours > 0)
            .ok_or(ConfigError::Expiration(hours))?;
        Ok(CacheConfig {
            expiration,
            enabled: self.cache.enabled,
        })
    }

    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        logging::parse_level(&self.log_level)
            .ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    pub fn open_storage(&self) -> Result<StorageOrigin, StorageError> {
        match &self.storage {
            StorageSettings::Memory => Ok(StorageOrigin::in_memory()),
            StorageSettings::File { path } => StorageOrigin::open(path),
        }
    }
}
