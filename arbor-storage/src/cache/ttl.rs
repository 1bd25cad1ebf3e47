//! Expiring document cache.
//!
//! Every entry carries its own lock and an expiry deadline that is pushed
//! forward on each access. Normal operations are admitted through the
//! [`DrainBarrier`]; [`TtlCache::sweep`] takes the barrier exclusively, so a
//! sweep never observes the map while a normal operation is touching it.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use arbor_core::{CacheSettings, Document, DocumentId, FieldChanges};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::barrier::DrainBarrier;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries removed by sweeps.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Counts normal operations and sweeps that are inside the cache at the
/// same moment. Any nonzero `overlaps` means the barrier let a sweep in
/// alongside a normal operation.
#[cfg(test)]
#[derive(Debug, Default)]
struct OverlapMonitor {
    normal: AtomicUsize,
    sweeping: AtomicUsize,
    visits: AtomicU64,
    sweeps: AtomicU64,
    overlaps: AtomicU64,
}

#[cfg(test)]
impl OverlapMonitor {
    fn enter_normal(&self) -> MonitorGuard<'_> {
        self.normal.fetch_add(1, Ordering::SeqCst);
        self.visits.fetch_add(1, Ordering::SeqCst);
        if self.sweeping.load(Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        MonitorGuard {
            counter: &self.normal,
        }
    }

    fn enter_sweep(&self) -> MonitorGuard<'_> {
        let concurrent_sweeps = self.sweeping.fetch_add(1, Ordering::SeqCst);
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        if concurrent_sweeps > 0 || self.normal.load(Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        MonitorGuard {
            counter: &self.sweeping,
        }
    }
}

#[cfg(test)]
struct MonitorGuard<'a> {
    counter: &'a AtomicUsize,
}

#[cfg(test)]
impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct SlotState {
    doc: Document,
    expires_at: Instant,
    // Set once the slot has been unlinked from the map.
    evicted: bool,
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
}

/// TTL cache of committed documents keyed by id.
#[derive(Debug)]
pub struct TtlCache {
    entries: RwLock<HashMap<DocumentId, Arc<Slot>>>,
    barrier: DrainBarrier,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    #[cfg(test)]
    monitor: OverlapMonitor,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            barrier: DrainBarrier::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            #[cfg(test)]
            monitor: OverlapMonitor::default(),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The admission barrier, exposed for instrumentation.
    pub fn barrier(&self) -> &DrainBarrier {
        &self.barrier
    }

    /// Number of linked entries, expired or not.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Whether an entry is linked for `id`. Does not refresh it.
    pub fn contains(&self, id: DocumentId) -> bool {
        self.read_entries().contains_key(&id)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Look up `id`, refreshing its deadline on a hit.
    ///
    /// An entry whose deadline has passed is a miss even before a sweep
    /// unlinks it.
    pub async fn get(&self, id: DocumentId) -> Option<Document> {
        let _admission = self.barrier.enter().await;
        #[cfg(test)]
        let _monitored = self.monitor.enter_normal();
        let Some(slot) = self.slot(id) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let mut state = slot.state.lock().await;
        let now = Instant::now();
        if state.evicted || now > state.expires_at {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        state.expires_at = now + self.ttl;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(state.doc.clone())
    }

    /// Insert or replace the entry for `doc.id`.
    pub async fn add(&self, doc: Document) {
        let _admission = self.barrier.enter().await;
        #[cfg(test)]
        let _monitored = self.monitor.enter_normal();
        let id = doc.id;
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                doc,
                expires_at: Instant::now() + self.ttl,
                evicted: false,
            }),
        });
        self.write_entries().insert(id, slot);
    }

    /// Apply `changes` to a cached entry. Returns false when `id` is not
    /// cached; nothing is populated in that case.
    ///
    /// Concurrent updates of the same field race and the last one wins.
    pub async fn update(&self, id: DocumentId, changes: &FieldChanges) -> bool {
        let _admission = self.barrier.enter().await;
        #[cfg(test)]
        let _monitored = self.monitor.enter_normal();
        let Some(slot) = self.slot(id) else {
            return false;
        };

        let mut state = slot.state.lock().await;
        if state.evicted {
            return false;
        }
        changes.apply_to(&mut state.doc);
        state.expires_at = Instant::now() + self.ttl;
        true
    }

    /// Unlink the entry for `id`, waiting for any operation holding the
    /// entry to finish first.
    pub async fn delete(&self, id: DocumentId) -> bool {
        let _admission = self.barrier.enter().await;
        #[cfg(test)]
        let _monitored = self.monitor.enter_normal();
        let Some(slot) = self.write_entries().remove(&id) else {
            return false;
        };
        slot.state.lock().await.evicted = true;
        true
    }

    /// Remove every entry whose deadline has passed. Runs with the barrier
    /// held exclusively and returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let _exclusive = self.barrier.exclusive().await;
        #[cfg(test)]
        let _monitored = self.monitor.enter_sweep();
        let now = Instant::now();

        let mut entries = self.write_entries();
        let expired: Vec<DocumentId> = entries
            .iter()
            .filter_map(|(id, slot)| match slot.state.try_lock() {
                Ok(state) if now > state.expires_at => Some(*id),
                _ => None,
            })
            .collect();

        for id in &expired {
            if let Some(slot) = entries.remove(id) {
                if let Ok(mut state) = slot.state.try_lock() {
                    state.evicted = true;
                }
            }
        }
        let remaining = entries.len();
        drop(entries);

        self.evictions
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), remaining, "cache sweep");
        }
        expired.len()
    }

    /// Run [`TtlCache::sweep`] every `interval` on the current runtime.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. Returns `None` when `interval` is zero.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            tracing::debug!("cache sweeper disabled");
            return None;
        }

        let cache = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(live) = cache.upgrade() else {
                    break;
                };
                live.sweep().await;
            }
            tracing::debug!("cache sweeper stopped");
        }))
    }

    fn slot(&self, id: DocumentId) -> Option<Arc<Slot>> {
        self.read_entries().get(&id).cloned()
    }

    // The map lock is never held across an await or a user callback, so a
    // poisoned guard still protects a consistent map.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<DocumentId, Arc<Slot>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<DocumentId, Arc<Slot>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
