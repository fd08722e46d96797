use crate::RouterId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// One-shot timers keyed by router id: an expiration timer per neighbor plus
/// the node's own keepalive timer, at most one live handle per id.
///
/// Cancellation is advisory. Each scheduled task carries the generation it
/// was registered under and re-checks the registry on wake; cancel and
/// replace bump the generation, so a sleeping task gives up, while one that
/// already passed the check runs to completion and cannot be stopped.
pub struct TimerRegistry {
    entries: Arc<Mutex<HashMap<RouterId, TimerEntry>>>,
    generations: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Schedules `callback` to run once after `delay`, replacing (and thereby
    /// advisorily cancelling) any timer already registered for `id`.
    pub fn schedule<F, Fut>(&self, id: RouterId, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst);
        let registry = Arc::clone(&self.entries);
        let task_id = id.clone();

        // The registry lock is held until the new entry is in place, so the
        // spawned task cannot race past its generation check early.
        let mut entries = self.entries.lock().unwrap();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut entries = registry.lock().unwrap();
                match entries.get(&task_id) {
                    Some(entry) if entry.generation == generation => {
                        entries.remove(&task_id);
                    }
                    // Cancelled or superseded while asleep.
                    _ => return,
                }
            }
            callback().await;
        });

        if let Some(old) = entries.insert(id, TimerEntry { generation, handle }) {
            // Still pre-gate (its entry was present), safe to drop outright.
            old.handle.abort();
        }
    }

    /// Advisory cancel: skips the timer if it has not started executing yet.
    /// Returns false when no timer was pending for `id`.
    pub fn cancel(&self, id: &str) -> bool {
        match self.entries.lock().unwrap().remove(id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self, id: &str) -> bool {
        self.entries.lock().unwrap().contains_key(id)
    }

    /// Best-effort stop of every pending timer. Callbacks already executing
    /// are not waited on.
    pub fn shutdown_all(&self) {
        let mut entries = self.entries.lock().unwrap();
        for (_, entry) in entries.drain() {
            entry.handle.abort();
        }
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[tokio::test]
    async fn timer_fires_and_clears_its_entry() {
        let registry = TimerRegistry::new();
        let (tx, rx) = oneshot::channel();

        registry.schedule("n1".to_string(), Duration::from_millis(20), move || async move {
            let _ = tx.send(());
        });
        assert!(registry.pending("n1"));

        timeout(Duration::from_secs(1), rx)
            .await
            .expect("timer never fired")
            .unwrap();
        assert!(!registry.pending("n1"));
        assert!(!registry.cancel("n1"));
    }

    #[tokio::test]
    async fn cancelled_timer_does_not_fire() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        registry.schedule("n1".to_string(), Duration::from_millis(30), move || async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(registry.cancel("n1"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rescheduling_supersedes_the_previous_timer() {
        let registry = TimerRegistry::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let flag = first.clone();
        registry.schedule("n1".to_string(), Duration::from_millis(30), move || async move {
            flag.store(true, Ordering::SeqCst);
        });
        let flag = second.clone();
        registry.schedule("n1".to_string(), Duration::from_millis(60), move || async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_all_drops_every_pending_timer() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));

        for id in ["a", "b", "c"] {
            let flag = fired.clone();
            registry.schedule(id.to_string(), Duration::from_millis(30), move || async move {
                flag.store(true, Ordering::SeqCst);
            });
        }
        registry.shutdown_all();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(!registry.pending("a"));
    }
}
