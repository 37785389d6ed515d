use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::TransportError;

type Outcome = Result<String, TransportError>;

/// Request deduplication system
/// When identical requests overlap, only the first one is executed
/// and its outcome is shared with every request that arrived meanwhile
pub struct RequestDeduplicator {
    /// Requests in flight, keyed by cache key, with whoever is waiting on them
    pending: DashMap<String, Vec<oneshot::Sender<Outcome>>>,
    enabled: bool,
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RequestDeduplicator {
    pub fn new(enabled: bool) -> Self {
        Self {
            pending: DashMap::new(),
            enabled,
        }
    }

    /// Run `request` unless an identical one is already in flight, in which
    /// case wait for that one instead
    pub async fn execute<F, Fut>(&self, key: &str, request: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        if !self.enabled {
            return request().await;
        }

        let waiter = match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let (tx, rx) = oneshot::channel();
                entry.get_mut().push(tx);
                Some(rx)
            }
            Entry::Vacant(entry) => {
                entry.insert(Vec::new());
                None
            }
        };

        if let Some(rx) = waiter {
            log::debug!("Request already pending for key: {}", key);
            return rx.await.unwrap_or_else(|_| {
                Err(TransportError::Network(
                    "shared request was abandoned".to_string(),
                ))
            });
        }

        log::debug!("Executing new request for key: {}", key);
        let guard = InFlight {
            pending: &self.pending,
            key,
            finished: false,
        };

        let outcome = request().await;

        let waiters = guard.finish();
        if !waiters.is_empty() {
            log::debug!("Notifying {} waiters for key: {}", waiters.len(), key);
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        outcome
    }

    /// Number of distinct requests currently in flight
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

/// Unregisters the leading request, also when its future is dropped midway.
struct InFlight<'a> {
    pending: &'a DashMap<String, Vec<oneshot::Sender<Outcome>>>,
    key: &'a str,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self) -> Vec<oneshot::Sender<Outcome>> {
        self.finished = true;
        self.pending
            .remove(self.key)
            .map(|(_, waiters)| waiters)
            .unwrap_or_default()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Dropping the senders wakes the waiters with an error.
            self.pending.remove(self.key);
        }
    }
}

/// Thread-safe wrapper for the deduplicator
pub type SharedRequestDeduplicator = Arc<RequestDeduplicator>;
