use getset::Getters;
use log::{debug, info};
use marvel_client::storage::{KeyValueStore, StorageError};
use marvel_client::MarvelClient;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::config::{Config, ConfigError};
use crate::logging;
use crate::detail::DetailLoader;
use crate::favorites::FavoritesStore;
use crate::lookup::CharacterLookup;
use crate::search::SearchCoordinator;
use crate::ui::UiState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything one browsing session shares.
///
/// The lookup table and UI mode live exactly as long as the session; the
/// favorites and the response cache live in storage and outlast it.
#[derive(Getters)]
#[get = "pub"]
pub struct Session {
    config: Config,
    client: MarvelClient,
    lookup: Arc<CharacterLookup>,
    favorites: Arc<FavoritesStore>,
    ui: Arc<UiState>,
    #[getset(skip)]
    favorites_watch: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: Config, client: MarvelClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            client,
            lookup: Arc::new(CharacterLookup::new()),
            favorites: Arc::new(FavoritesStore::new(store)),
            ui: Arc::new(UiState::new()),
            favorites_watch: None,
        }
    }

    /// Session talking to the real API, storage chosen by `config`.
    pub fn from_config(config: Config) -> Result<Self, SessionError> {
        let origin = config.open_storage()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(origin.context());
        let client = MarvelClient::with_cache(
            config.client_config(),
            store.clone(),
            config.cache_config()?,
        );
        info!(
            "Initialized MarvelClient with caching (expiration: {}h, enabled: {})",
            config.cache().expiration_hours(),
            config.cache().enabled()
        );
        Ok(Self::new(config, client, store))
    }

    /// Load configuration from `path` and the environment, install the
    /// terminal logger at the configured level, then build.
    pub fn open(path: Option<&Path>) -> Result<Self, SessionError> {
        let config = Config::load(path)?;
        if let Err(err) = logging::init(config.log_filter()?) {
            debug!("Keeping the installed logger: {}", err);
        }
        Self::from_config(config)
    }

    /// Start following favorites changes from other contexts.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) {
        if self.favorites_watch.is_none() {
            self.favorites_watch = Some(self.favorites.watch());
        }
    }

    /// A list view over this session's services.
    pub fn search(&self) -> SearchCoordinator {
        SearchCoordinator::new(
            self.client.clone(),
            self.lookup.clone(),
            self.favorites.clone(),
            self.ui.clone(),
            self.config.debounce(),
        )
    }

    /// A detail view over this session's services.
    pub fn detail(&self) -> DetailLoader {
        DetailLoader::new(
            self.client.clone(),
            self.lookup.clone(),
            *self.config.search().comics_limit(),
            self.config.search().comics_order_by().clone(),
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(watch) = self.favorites_watch.take() {
            watch.abort();
        }
    }
}
