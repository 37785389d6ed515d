use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::storage::{KeyValueStore, StorageError};

const CHARACTERS_PREFIX: &str = "marvel_cache_public/characters_";
const COMICS_PREFIX: &str = "marvel_comics_";

/// Configuration for the cache system
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// How long an entry stays valid after it was written
    pub expiration: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: Duration::hours(24),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new(expiration: Duration) -> Self {
        Self {
            expiration,
            enabled: true,
        }
    }
}

/// What gets written to storage for every cached response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    pub data: T,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            data,
        }
    }

    /// Valid while strictly younger than `expiration` at `now_millis`.
    pub fn is_valid_at(&self, now_millis: i64, expiration: Duration) -> bool {
        now_millis - self.timestamp < expiration.num_milliseconds()
    }
}

#[derive(Deserialize)]
struct EntryHeader {
    timestamp: i64,
}

/// Identity of a cacheable request.
///
/// Comics are keyed by character only; paging parameters are not part of the
/// key, so one entry exists per character whatever `limit`/`orderBy` were.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum CacheKey {
    /// Character listing filtered by a name prefix
    Characters(String),
    /// Comics of one character
    Comics(u64),
}

impl CacheKey {
    /// The string the entry is stored under.
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::Characters(prefix) => format!("{}{}", CHARACTERS_PREFIX, prefix),
            CacheKey::Comics(id) => format!("{}{}", COMICS_PREFIX, id),
        }
    }

    /// Whether a raw storage key belongs to the cache.
    pub fn is_cache_key(key: &str) -> bool {
        key.starts_with(CHARACTERS_PREFIX) || key.starts_with(COMICS_PREFIX)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Expiring cache on top of a [`KeyValueStore`].
///
/// Reads never fail: anything missing, expired or unreadable is a miss, and
/// expired or unreadable entries are deleted on the spot.
pub struct KeyedCache {
    store: Arc<dyn KeyValueStore>,
    pub config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl KeyedCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Get cached payload if available and valid
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let storage_key = key.storage_key();
        let Some(raw) = self.store.get_item(&storage_key) else {
            log::debug!("Cache miss for key: {}", key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if entry.is_valid_at(Utc::now().timestamp_millis(), self.config.expiration) => {
                log::debug!("Cache hit for key: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data);
            }
            Ok(_) => {
                log::debug!("Cache expired for key: {}", key);
                self.discard(&storage_key);
            }
            Err(err) => {
                log::warn!("Discarding unreadable cache entry {}: {}", key, err);
                self.discard(&storage_key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store payload in cache, replacing whatever was there
    pub fn put<T: Serialize>(&self, key: &CacheKey, data: &T) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(data);
        let result = serde_json::to_string(&entry)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set_item(&key.storage_key(), &json));

        match result {
            Ok(()) => log::debug!("Stored in cache with key: {}", key),
            Err(err) => log::warn!("Failed to store cache entry {}: {}", key, err),
        }
    }

    /// Remove expired and unreadable entries, returning how many went
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now().timestamp_millis();
        let window = self.config.expiration.num_milliseconds();
        let stale: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| CacheKey::is_cache_key(key))
            .filter(|key| {
                match self
                    .store
                    .get_item(key)
                    .map(|raw| serde_json::from_str::<EntryHeader>(&raw))
                {
                    Some(Ok(header)) => now - header.timestamp >= window,
                    Some(Err(_)) => true,
                    None => false,
                }
            })
            .collect();

        for key in &stale {
            self.discard(key);
        }

        log::debug!("Evicted {} expired cache entries", stale.len());
        stale.len()
    }

    /// Clear all cache entries, leaving unrelated storage keys alone
    pub fn clear(&self) {
        for key in self.store.keys().into_iter().filter(|k| CacheKey::is_cache_key(k)) {
            if let Err(err) = self.store.remove_item(&key) {
                log::warn!("Failed to remove cache entry {}: {}", key, err);
            }
        }
        log::info!("Cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self
                .store
                .keys()
                .iter()
                .filter(|k| CacheKey::is_cache_key(k))
                .count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn discard(&self, storage_key: &str) {
        match self.store.remove_item(storage_key) {
            Ok(()) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => log::warn!("Failed to remove cache entry {}: {}", storage_key, err),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe wrapper for the cache
pub type SharedKeyedCache = Arc<KeyedCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CharacterRecord;
    use crate::storage::{StorageContext, StorageOrigin};

    fn cache() -> (KeyedCache, StorageContext) {
        let store = StorageOrigin::in_memory().context();
        (KeyedCache::new(Arc::new(store.clone()), CacheConfig::default()), store)
    }

    fn write_aged(store: &StorageContext, key: &CacheKey, age: Duration) {
        let entry = CacheEntry {
            timestamp: (Utc::now() - age).timestamp_millis(),
            data: vec![CharacterRecord::new(1, "Aged")],
        };
        store
            .set_item(&key.storage_key(), &serde_json::to_string(&entry).unwrap())
            .unwrap();
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = CacheKey::Characters("spi".to_string());
        let key2 = CacheKey::Characters("spi".to_string());

        assert_eq!(key1.storage_key(), key2.storage_key());
        assert_eq!(key1.storage_key(), "marvel_cache_public/characters_spi");
        assert_eq!(CacheKey::Comics(1234).storage_key(), "marvel_comics_1234");

        // Different query should produce different key
        assert_ne!(key1.storage_key(), CacheKey::Characters("spid".to_string()).storage_key());
        assert_ne!(
            CacheKey::Characters("1234".to_string()).storage_key(),
            CacheKey::Comics(1234).storage_key()
        );
    }

    #[test]
    fn test_put_then_get_returns_payload() {
        let (cache, _) = cache();
        let key = CacheKey::Characters("3-D".to_string());
        let payload = vec![CharacterRecord::new(1011334, "3-D Man")];

        cache.put(&key, &payload);

        assert_eq!(cache.get::<Vec<CharacterRecord>>(&key), Some(payload));
        assert_eq!(cache.get::<Vec<String>>(&CacheKey::Comics(1)), None);
    }

    #[test]
    fn test_stored_shape_is_timestamp_and_data() {
        let (cache, store) = cache();
        let key = CacheKey::Comics(1234);

        cache.put(&key, &vec!["x".to_string()]);

        let raw: serde_json::Value =
            serde_json::from_str(&store.get_item("marvel_comics_1234").unwrap()).unwrap();
        assert!(raw["timestamp"].is_i64());
        assert_eq!(raw["data"], serde_json::json!(["x"]));
    }

    #[test]
    fn test_expiry_boundary() {
        let (cache, store) = cache();
        let key = CacheKey::Characters("old".to_string());

        write_aged(&store, &key, Duration::hours(23) + Duration::minutes(59));
        assert!(cache.get::<Vec<CharacterRecord>>(&key).is_some());

        write_aged(&store, &key, Duration::hours(24) + Duration::minutes(1));
        assert!(cache.get::<Vec<CharacterRecord>>(&key).is_none());
        assert_eq!(store.get_item(&key.storage_key()), None);
    }

    #[test]
    fn test_entry_validity_is_strict_at_window() {
        let window = Duration::hours(24);
        let entry = CacheEntry { timestamp: 0, data: () };

        assert!(entry.is_valid_at(window.num_milliseconds() - 1, window));
        assert!(!entry.is_valid_at(window.num_milliseconds(), window));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss_and_deleted() {
        let (cache, store) = cache();
        let key = CacheKey::Characters("spi".to_string());
        store.set_item(&key.storage_key(), "{not json").unwrap();

        assert_eq!(cache.get::<Vec<CharacterRecord>>(&key), None);
        assert_eq!(store.get_item(&key.storage_key()), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_evict_expired_and_clear_leave_other_keys() {
        let (cache, store) = cache();
        store.set_item("favorites", "[]").unwrap();
        write_aged(&store, &CacheKey::Characters("a".to_string()), Duration::hours(30));
        write_aged(&store, &CacheKey::Characters("b".to_string()), Duration::hours(1));
        store.set_item(&CacheKey::Comics(5).storage_key(), "garbage").unwrap();

        assert_eq!(cache.evict_expired(), 2);
        assert_eq!(cache.stats().total_entries, 1);

        cache.clear();
        assert_eq!(cache.stats().total_entries, 0);
        assert_eq!(store.get_item("favorites").as_deref(), Some("[]"));
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let store = StorageOrigin::in_memory().context();
        let cache = KeyedCache::new(
            Arc::new(store.clone()),
            CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
        );
        let key = CacheKey::Comics(1);

        cache.put(&key, &vec![1, 2, 3]);

        assert_eq!(cache.get::<Vec<i32>>(&key), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let (cache, _) = cache();
        let key = CacheKey::Comics(9);

        assert_eq!(cache.get::<Vec<i32>>(&key), None);
        cache.put(&key, &vec![1]);
        assert_eq!(cache.get::<Vec<i32>>(&key), Some(vec![1]));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.total_entries), (1, 1, 1));
    }
}
