use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Slot<T> {
    generation: u64,
    value: Option<T>,
    timer: Option<JoinHandle<()>>,
}

struct Shared<T> {
    committed: watch::Sender<T>,
    slot: Mutex<Slot<T>>,
}

/// Holds back a fast changing value until it has been quiet for `delay`.
///
/// Every [`set`](Debouncer::set) cancels the timer started by the previous
/// one, so only the last value of a burst is committed. Dropping the
/// debouncer cancels whatever is still pending.
///
/// Must be used from within a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    shared: Arc<Shared<T>>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (committed, _) = watch::channel(initial);
        Self {
            delay,
            shared: Arc::new(Shared {
                committed,
                slot: Mutex::new(Slot {
                    generation: 0,
                    value: None,
                    timer: None,
                }),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value`, replacing anything still pending.
    pub fn set(&self, value: T) {
        let mut slot = lock(&self.shared.slot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;
        slot.value = Some(value);

        let generation = slot.generation;
        let shared = self.shared.clone();
        let delay = self.delay;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut slot = lock(&shared.slot);
            // A newer value may have been set while this timer was firing.
            if slot.generation == generation {
                if let Some(value) = slot.value.take() {
                    slot.timer = None;
                    shared.committed.send_replace(value);
                }
            }
        }));
    }

    /// Commit the pending value right away, if there is one.
    pub fn flush(&self) {
        let mut slot = lock(&self.shared.slot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;
        if let Some(value) = slot.value.take() {
            self.shared.committed.send_replace(value);
        }
    }

    /// Drop the pending value without committing it.
    pub fn cancel(&self) {
        let mut slot = lock(&self.shared.slot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;
        slot.value = None;
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.shared.slot).value.is_some()
    }

    /// Last committed value.
    pub fn current(&self) -> T {
        self.shared.committed.borrow().clone()
    }

    /// Notified on every commit.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.committed.subscribe()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shared.slot.lock() {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.value = None;
        }
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> std::sync::MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_only_last_value_of_burst_commits() {
        let debouncer = Debouncer::new(String::new(), Duration::from_millis(300));
        let mut rx = debouncer.subscribe();
        let start = Instant::now();

        debouncer.set("S".to_string());
        sleep(Duration::from_millis(50)).await;
        debouncer.set("Sp".to_string());
        sleep(Duration::from_millis(50)).await;
        debouncer.set("Spi".to_string());
        assert!(debouncer.is_pending());

        rx.changed().await.unwrap();

        assert_eq!(start.elapsed().as_millis(), 400);
        assert_eq!(*rx.borrow_and_update(), "Spi");
        assert!(!debouncer.is_pending());

        // Nothing else is coming.
        sleep(Duration::from_secs(5)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_held_until_quiet() {
        let debouncer = Debouncer::new(0u32, Duration::from_millis(300));

        debouncer.set(1);
        sleep(Duration::from_millis(299)).await;
        assert_eq!(debouncer.current(), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(debouncer.current(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_cancel() {
        let debouncer = Debouncer::new(0u32, Duration::from_millis(300));

        debouncer.set(1);
        debouncer.flush();
        assert_eq!(debouncer.current(), 1);

        debouncer.set(2);
        debouncer.cancel();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(debouncer.current(), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_timer() {
        let debouncer = Debouncer::new(0u32, Duration::from_millis(300));
        let mut rx = debouncer.subscribe();

        debouncer.set(1);
        drop(debouncer);

        // The sender goes away with the debouncer and nothing was committed.
        assert!(rx.changed().await.is_err());
        assert_eq!(*rx.borrow(), 0);
    }
}
