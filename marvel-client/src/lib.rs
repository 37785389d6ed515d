pub mod auth;
pub mod cache;
pub mod deduplication;
mod error;
pub mod models;
pub mod storage;
mod transport;


use cache::{CacheConfig, CacheKey, KeyedCache, SharedKeyedCache};
use deduplication::{RequestDeduplicator, SharedRequestDeduplicator};
use getset::Getters;
use models::response::parse_results;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use storage::KeyValueStore;

pub use auth::Auth;
pub use error::{Error, ErrorKind, TransportError};
pub use models::{CharacterRecord, ComicRecord, ComicSummary, Image};
pub use transport::{SurfTransport, Transport};

// Re-export cache types
pub use cache::{CacheEntry, CacheStats};

pub const CHARACTERS_ENDPOINT: &str = "public/characters";
pub const DEFAULT_BASE_URL: &str = "https://gateway.marvel.com/v1/";
pub const DEFAULT_CHARACTER_LIMIT: u32 = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the API.
#[derive(Clone, Debug, Getters)]
#[get = "pub"]
pub struct ClientConfig {
    base_url: String,
    auth: Auth,
    /// Page size of character listings
    character_limit: u32,
    /// Upper bound on a single request, network included
    request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            character_limit: DEFAULT_CHARACTER_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_character_limit(mut self, limit: u32) -> Self {
        self.character_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Clone)]
pub struct MarvelClient {
    transport: Arc<dyn Transport>,
    cache: Option<SharedKeyedCache>,
    deduplicator: SharedRequestDeduplicator,
    config: Arc<ClientConfig>,
}

impl MarvelClient {
    /// Create a new MarvelClient without caching
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(SurfTransport::new()),
            cache: None,
            deduplicator: Arc::new(RequestDeduplicator::default()),
            config: Arc::new(config),
        }
    }

    /// Create a new MarvelClient that caches responses in `store`
    pub fn with_cache(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            cache: Some(Arc::new(KeyedCache::new(store, cache_config))),
            ..Self::new(config)
        }
    }

    /// Swap the HTTP layer, mostly for tests
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Characters whose name starts with `prefix`; all of them when empty
    pub async fn fetch_characters(&self, prefix: &str) -> Result<Vec<CharacterRecord>, Error> {
        let mut params = vec![];
        if !prefix.is_empty() {
            params.push(("nameStartsWith", prefix.to_string()));
        }
        params.push(("limit", self.config.character_limit.to_string()));

        self.fetch_collection(
            ErrorKind::Characters,
            CacheKey::Characters(prefix.to_string()),
            CHARACTERS_ENDPOINT.to_string(),
            params,
        )
        .await
    }

    /// Comics featuring a character.
    ///
    /// Cached per character only, so a later call with other `limit` or
    /// `order_by` values gets whatever was cached first.
    pub async fn fetch_comics_for_character(
        &self,
        character_id: u64,
        limit: u32,
        order_by: &str,
    ) -> Result<Vec<ComicRecord>, Error> {
        self.fetch_collection(
            ErrorKind::Comics,
            CacheKey::Comics(character_id),
            format!("{}/{}/comics", CHARACTERS_ENDPOINT, character_id),
            vec![("limit", limit.to_string()), ("orderBy", order_by.to_string())],
        )
        .await
    }

    async fn fetch_collection<T>(
        &self,
        kind: ErrorKind,
        key: CacheKey,
        path: String,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned + Serialize,
    {
        // Try cache first
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<Vec<T>>(&key) {
                log::info!("Returning cached result for {}", key);
                return Ok(cached);
            }
        }

        let body = self
            .deduplicator
            .execute(&key.storage_key(), || self.request(&path, params))
            .await
            .map_err(|cause| {
                log::error!("{}: {}", kind, cause);
                Error::new(kind, cause)
            })?;

        let results: Vec<T> = parse_results(&body).map_err(|cause| {
            log::error!("{}: {}", kind, cause);
            Error::new(kind, cause)
        })?;

        if let Some(cache) = &self.cache {
            cache.put(&key, &results);
        }

        Ok(results)
    }

    async fn request(
        &self,
        path: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, TransportError> {
        let mut query = self.config.auth.query_params();
        query.extend(params);

        let url = utils::request_url::build_url(&self.config.base_url, path, &query)
            .map_err(|e| TransportError::Url(e.to_string()))?;

        let timeout = self.config.request_timeout;
        tokio::time::timeout(timeout, self.transport.get(url))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    /// Get cache statistics if caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Clear cache if caching is enabled
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Evict expired cache entries if caching is enabled
    pub fn evict_expired_cache(&self) -> usize {
        self.cache
            .as_ref()
            .map(|cache| cache.evict_expired())
            .unwrap_or(0)
    }
}
