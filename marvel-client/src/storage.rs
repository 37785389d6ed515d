//! Durable per-origin key-value storage.
//!
//! A [`StorageOrigin`] owns the data. Each [`StorageContext`] created from it
//! behaves like one browser tab: it reads and writes the shared entries, and
//! its subscribers hear about changes made by *other* contexts only.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Capacity of the change notification channel per origin.
const EVENT_CAPACITY: usize = 256;

/// A change made to the origin by some context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage access denied")]
    AccessDenied,
}

/// String valued key-value store with change notifications.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Vec<String>;

    /// Changes made through other handles on the same data.
    fn subscribe(&self) -> StorageSubscription;
}

#[derive(Debug, Clone)]
struct Notification {
    source: u64,
    event: StorageEvent,
}

struct OriginInner {
    entries: Mutex<HashMap<String, String>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<Notification>,
    next_context: AtomicU64,
}

/// Shared storage for every context of one origin.
#[derive(Clone)]
pub struct StorageOrigin {
    inner: Arc<OriginInner>,
}

impl StorageOrigin {
    /// Origin that lives for as long as the process does.
    pub fn in_memory() -> Self {
        Self::with_entries(HashMap::new(), None)
    }

    /// Origin backed by a JSON file, created on first write if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        debug!("Opened storage at {} with {} entries", path.display(), entries.len());
        Ok(Self::with_entries(entries, Some(path)))
    }

    fn with_entries(entries: HashMap<String, String>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(OriginInner {
                entries: Mutex::new(entries),
                path,
                events,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// New handle on this origin, the equivalent of opening another tab.
    pub fn context(&self) -> StorageContext {
        StorageContext {
            origin: self.clone(),
            id: self.inner.next_context.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn mutate(&self, source: u64, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        let mut entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| StorageError::AccessDenied)?;

        let old_value = match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };

        if let Some(path) = &self.inner.path {
            if let Err(err) = persist(path, &entries) {
                // Keep memory and disk in agreement.
                match &old_value {
                    Some(old) => entries.insert(key.to_string(), old.clone()),
                    None => entries.remove(key),
                };
                return Err(err);
            }
        }
        drop(entries);

        let new_value = value.map(str::to_string);
        if old_value != new_value {
            let _ = self.inner.events.send(Notification {
                source,
                event: StorageEvent {
                    key: key.to_string(),
                    old_value,
                    new_value,
                },
            });
        }
        Ok(())
    }
}

fn persist(path: &Path, entries: &HashMap<String, String>) -> Result<(), StorageError> {
    let json = serde_json::to_string(entries)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// One execution context (tab) on a [`StorageOrigin`].
#[derive(Clone)]
pub struct StorageContext {
    origin: StorageOrigin,
    id: u64,
}

impl StorageContext {
    pub fn origin(&self) -> &StorageOrigin {
        &self.origin
    }
}

impl KeyValueStore for StorageContext {
    fn get_item(&self, key: &str) -> Option<String> {
        self.origin.inner.entries.lock().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.origin.mutate(self.id, key, Some(value))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.origin.mutate(self.id, key, None)
    }

    fn keys(&self) -> Vec<String> {
        self.origin
            .inner
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription {
            context: self.id,
            rx: self.origin.inner.events.subscribe(),
        }
    }
}

/// Stream of changes made by other contexts.
pub struct StorageSubscription {
    context: u64,
    rx: broadcast::Receiver<Notification>,
}

impl StorageSubscription {
    /// Next foreign change. `None` once the origin is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(notification) if notification.source == self.context => continue,
                Ok(notification) => return Some(notification.event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Storage subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next foreign change if one is already queued.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(notification) if notification.source == self.context => continue,
                Ok(notification) => return Some(notification.event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Storage subscriber lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_contexts_share_entries() {
        let origin = StorageOrigin::in_memory();
        let tab_a = origin.context();
        let tab_b = origin.context();

        tab_a.set_item("k", "v").unwrap();

        assert_eq!(tab_b.get_item("k").as_deref(), Some("v"));
        assert_eq!(tab_b.keys(), vec!["k".to_string()]);

        tab_b.remove_item("k").unwrap();
        assert_eq!(tab_a.get_item("k"), None);
    }

    #[test]
    fn test_events_only_reach_other_contexts() {
        let origin = StorageOrigin::in_memory();
        let tab_a = origin.context();
        let tab_b = origin.context();
        let mut a_events = tab_a.subscribe();
        let mut b_events = tab_b.subscribe();

        tab_a.set_item("favorites", "[]").unwrap();

        assert_eq!(a_events.try_recv(), None);
        assert_eq!(
            b_events.try_recv(),
            Some(StorageEvent {
                key: "favorites".to_string(),
                old_value: None,
                new_value: Some("[]".to_string()),
            })
        );
    }

    #[test]
    fn test_unchanged_write_is_silent() {
        let origin = StorageOrigin::in_memory();
        let tab_a = origin.context();
        let mut b_events = origin.context().subscribe();

        tab_a.set_item("k", "v").unwrap();
        tab_a.set_item("k", "v").unwrap();
        tab_a.remove_item("missing").unwrap();

        assert!(b_events.try_recv().is_some());
        assert_eq!(b_events.try_recv(), None);
    }

    #[tokio::test]
    async fn test_async_recv_reports_removal() {
        let origin = StorageOrigin::in_memory();
        let tab_a = origin.context();
        let mut b_events = origin.context().subscribe();

        tab_a.set_item("k", "v").unwrap();
        tab_a.remove_item("k").unwrap();

        assert_eq!(b_events.recv().await.unwrap().new_value.as_deref(), Some("v"));
        let removal = b_events.recv().await.unwrap();
        assert_eq!(removal.old_value.as_deref(), Some("v"));
        assert_eq!(removal.new_value, None);
    }

    #[test]
    fn test_file_origin_survives_reopen() {
        let dir = TempDir::new("storage").unwrap();
        let path = dir.path().join("origin.json");

        {
            let origin = StorageOrigin::open(&path).unwrap();
            let tab = origin.context();
            tab.set_item("a", "1").unwrap();
            tab.set_item("b", "2").unwrap();
            tab.remove_item("a").unwrap();
        }

        let reopened = StorageOrigin::open(&path).unwrap().context();
        assert_eq!(reopened.get_item("a"), None);
        assert_eq!(reopened.get_item("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_file_origin_rejects_garbage() {
        let dir = TempDir::new("storage").unwrap();
        let path = dir.path().join("origin.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            StorageOrigin::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
