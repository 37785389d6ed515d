use log::{debug, warn};
use marvel_client::storage::{KeyValueStore, StorageError, StorageEvent};
use marvel_client::CharacterRecord;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Storage key the favorites list is persisted under.
pub const FAVORITES_KEY: &str = "favorites";

/// Persisted, ordered set of favorite characters.
///
/// Every change is written through to storage straight away. Changes written
/// by other contexts of the same origin replace the local list wholesale, so
/// two contexts toggling at the same time resolve last-writer-wins.
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    favorites: watch::Sender<Vec<CharacterRecord>>,
}

impl FavoritesStore {
    /// Load whatever is persisted; unreadable data counts as no favorites.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let initial = match store.get_item(FAVORITES_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Ignoring unreadable favorites: {}", err);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let (favorites, _) = watch::channel(initial);
        Self { store, favorites }
    }

    /// Add the character if absent, remove it if present.
    ///
    /// Returns whether it is a favorite afterwards. When the change cannot be
    /// persisted nothing changes, in memory or in storage.
    pub fn toggle_favorite(&self, character: &CharacterRecord) -> bool {
        let mut now_favorite = false;
        self.favorites.send_if_modified(|favorites| {
            let mut updated = favorites.clone();
            let added = match updated.iter().position(|f| f.id == character.id) {
                Some(index) => {
                    updated.remove(index);
                    false
                }
                None => {
                    updated.push(character.clone());
                    true
                }
            };
            match self.persist(&updated) {
                Ok(()) => {
                    *favorites = updated;
                    now_favorite = added;
                    debug!(
                        "Character {} {} favorites",
                        character.id,
                        if added { "added to" } else { "removed from" }
                    );
                    true
                }
                Err(err) => {
                    warn!("Failed to persist favorites, keeping previous list: {}", err);
                    now_favorite = !added;
                    false
                }
            }
        });
        now_favorite
    }

    pub fn is_favorite(&self, id: u64) -> bool {
        self.favorites.borrow().iter().any(|f| f.id == id)
    }

    /// Favorites in the order they were added.
    pub fn favorites(&self) -> Vec<CharacterRecord> {
        self.favorites.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.favorites.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.borrow().is_empty()
    }

    /// Notified whenever the list changes, locally or from another context.
    pub fn subscribe(&self) -> watch::Receiver<Vec<CharacterRecord>> {
        self.favorites.subscribe()
    }

    /// Take over a change another context made to storage.
    ///
    /// Returns whether the local list was replaced.
    pub fn apply_event(&self, event: &StorageEvent) -> bool {
        if event.key != FAVORITES_KEY {
            return false;
        }

        let replacement = match &event.new_value {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<CharacterRecord>>(raw) {
                Ok(list) => list,
                Err(err) => {
                    warn!("Ignoring unreadable favorites from another context: {}", err);
                    return false;
                }
            },
        };

        debug!("Favorites replaced by another context ({} entries)", replacement.len());
        self.favorites.send_replace(replacement);
        true
    }

    /// Follow changes made by other contexts until the store is dropped.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        // Closes together with the store.
        let mut alive = self.favorites.subscribe();
        let this: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else {
                            break;
                        };
                        let Some(store) = this.upgrade() else {
                            break;
                        };
                        store.apply_event(&event);
                    }
                    changed = alive.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Stopped following favorites");
        })
    }

    fn persist(&self, favorites: &[CharacterRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_string(favorites)?;
        self.store.set_item(FAVORITES_KEY, &json)
    }
}
