use log::{debug, info, warn};
use marvel_client::{CharacterRecord, Error, MarvelClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::debounce::Debouncer;
use crate::favorites::FavoritesStore;
use crate::lookup::CharacterLookup;
use crate::ui::UiState;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchPhase {
    /// Showing the last fetched list
    Idle,
    /// Query changed, waiting for typing to settle
    Pending,
    /// Request for `requested` in flight
    Fetching,
    /// Last request failed; `retry` runs it again
    Errored(Error),
}

#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub phase: SearchPhase,
    /// Raw text of the search box
    pub query: String,
    /// Prefix of the most recent request
    pub requested: String,
    /// Last list that made it through
    pub results: Vec<CharacterRecord>,
    /// Prefix `results` were fetched for, `None` before the first list lands
    pub shown: Option<String>,
    /// Bumped for every request and every query change; a response is only
    /// applied while its generation is still the current one
    pub generation: u64,
}

struct Shared {
    client: MarvelClient,
    lookup: Arc<CharacterLookup>,
    state: watch::Sender<SearchSnapshot>,
}

/// Drives the searchable character list.
///
/// Typing goes through [`set_query`](Self::set_query): the raw text filters
/// the visible list immediately, and once it has settled for the debounce
/// window a request for it is made. Responses for anything but the newest
/// request are dropped.
pub struct SearchCoordinator {
    shared: Arc<Shared>,
    favorites: Arc<FavoritesStore>,
    ui: Arc<UiState>,
    debouncer: Debouncer<String>,
    driver: JoinHandle<()>,
}

impl SearchCoordinator {
    /// Must be called within a tokio runtime.
    pub fn new(
        client: MarvelClient,
        lookup: Arc<CharacterLookup>,
        favorites: Arc<FavoritesStore>,
        ui: Arc<UiState>,
        debounce: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SearchSnapshot {
            phase: SearchPhase::Idle,
            query: String::new(),
            requested: String::new(),
            results: Vec::new(),
            shown: None,
            generation: 0,
        });
        let shared = Arc::new(Shared {
            client,
            lookup,
            state,
        });
        let debouncer = Debouncer::new(String::new(), debounce);
        let driver = tokio::spawn(drive(shared.clone(), debouncer.subscribe()));

        Self {
            shared,
            favorites,
            ui,
            debouncer,
            driver,
        }
    }

    /// Record new search box text and schedule a request for it.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let changed = self.shared.state.send_if_modified(|s| {
            if s.query == query {
                return false;
            }
            s.query = query.clone();
            s.generation += 1;
            s.phase = SearchPhase::Pending;
            true
        });
        if changed {
            self.debouncer.set(query);
        }
    }

    /// Request `query` right away, skipping the debounce window.
    pub fn search_now(&self, query: impl Into<String>) -> JoinHandle<()> {
        let query = query.into();
        self.debouncer.cancel();
        self.shared.state.send_modify(|s| s.query = query.clone());
        start_fetch(&self.shared, query)
    }

    /// Load the unfiltered list.
    pub fn load_initial(&self) -> JoinHandle<()> {
        start_fetch(&self.shared, String::new())
    }

    /// Run the failed request again. `None` unless the last one failed.
    pub fn retry(&self) -> Option<JoinHandle<()>> {
        let requested = {
            let snapshot = self.shared.state.borrow();
            match snapshot.phase {
                SearchPhase::Errored(_) => snapshot.requested.clone(),
                _ => return None,
            }
        };
        info!("Retrying search for {:?}", requested);
        Some(start_fetch(&self.shared, requested))
    }

    /// Back to the full list: favorites mode off, search box and error cleared.
    pub fn reset_home(&self) {
        self.ui.set_show_favorites(false);
        self.debouncer.cancel();
        let mut unfiltered_shown = false;
        self.shared.state.send_modify(|s| {
            s.query.clear();
            if !matches!(s.phase, SearchPhase::Fetching) {
                s.phase = SearchPhase::Idle;
            }
            unfiltered_shown = s.shown.as_deref() == Some("");
        });
        if !unfiltered_shown {
            start_fetch(&self.shared, String::new());
        }
    }

    /// What the list should show right now.
    ///
    /// The base list is either the favorites or the last fetched results,
    /// narrowed by a case-insensitive match of the raw query on the name.
    pub fn displayed(&self) -> Vec<CharacterRecord> {
        let (query, results) = {
            let snapshot = self.shared.state.borrow();
            (snapshot.query.clone(), snapshot.results.clone())
        };
        let base = if self.ui.show_favorites() {
            self.favorites.favorites()
        } else {
            results
        };
        base.into_iter().filter(|c| c.name_contains(&query)).collect()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn phase(&self) -> SearchPhase {
        self.shared.state.borrow().phase.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.shared.state.subscribe()
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(shared: Arc<Shared>, mut settled: watch::Receiver<String>) {
    while settled.changed().await.is_ok() {
        let query = settled.borrow_and_update().clone();
        // A cleared box still needs the unfiltered list on screen.
        let unfiltered_shown = shared.state.borrow().shown.as_deref() == Some("");
        if query.is_empty() && unfiltered_shown {
            shared.state.send_if_modified(|s| {
                if s.phase != SearchPhase::Pending {
                    return false;
                }
                s.phase = SearchPhase::Idle;
                true
            });
            continue;
        }
        start_fetch(&shared, query);
    }
}

fn start_fetch(shared: &Arc<Shared>, query: String) -> JoinHandle<()> {
    let mut generation = 0;
    shared.state.send_modify(|s| {
        s.generation += 1;
        generation = s.generation;
        s.requested = query.clone();
        s.phase = SearchPhase::Fetching;
    });
    debug!("Fetching characters for {:?} (generation {})", query, generation);

    let shared = shared.clone();
    tokio::spawn(async move {
        let outcome = shared.client.fetch_characters(&query).await;
        apply(&shared, generation, &query, outcome);
    })
}

fn apply(
    shared: &Shared,
    generation: u64,
    query: &str,
    outcome: Result<Vec<CharacterRecord>, Error>,
) {
    if let Ok(characters) = &outcome {
        // Records are good data even when the list they came in is stale.
        shared.lookup.upsert_all(characters.iter().cloned());
    }

    let applied = shared.state.send_if_modified(|s| {
        if s.generation != generation {
            // Superseded, but still the answer to what the box says now.
            return match outcome {
                Ok(characters) if s.query == query => {
                    s.results = characters;
                    s.shown = Some(query.to_string());
                    true
                }
                _ => false,
            };
        }
        match outcome {
            Ok(characters) => {
                s.results = characters;
                s.shown = Some(query.to_string());
                s.phase = SearchPhase::Idle;
            }
            Err(err) => {
                warn!("Search for {:?} failed: {}", query, err.cause());
                s.phase = SearchPhase::Errored(err);
            }
        }
        true
    });

    if !applied {
        debug!("Discarding stale response for {:?} (generation {})", query, generation);
    }
}
