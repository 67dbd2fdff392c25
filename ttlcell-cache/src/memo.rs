//! Keyed TTL memoization.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use ttlcell_core::{ttl_millis, Clock, MemoConfig, MonotonicClock};

/// Memo entry with TTL.
#[derive(Clone, Debug)]
struct MemoEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> MemoEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Per-key storage. Empty until a producer succeeds for the key.
type Slot<V> = Arc<Mutex<Option<MemoEntry<V>>>>;

/// True if the slot is idle and holds nothing fresh. Busy slots count as live.
fn is_idle_and_stale<V>(slot: &Slot<V>, now: Instant) -> bool {
    slot.try_lock()
        .map_or(false, |entry| entry.as_ref().map_or(true, |e| e.is_expired_at(now)))
}

/// A bounded map of independently expiring values.
///
/// Each key behaves like its own [`TtlCell`](crate::TtlCell): a lookup either
/// returns a fresh value or runs the producer and stores the result. Every
/// key has its own lock, and the producer runs holding only that lock. Two
/// threads missing on the same key compute once. Lookups of other keys, and
/// producers that read other keys of the same memo, are not blocked.
///
/// A producer must not look up its own key: the per-key lock is not
/// reentrant.
///
/// When full, expired entries are dropped first (if `auto_cleanup` is set),
/// then the oldest entry is evicted. Entries whose producer is still running
/// are never evicted, so the memo can briefly exceed its capacity.
#[derive(Debug)]
pub struct TtlMemo<K, V, C = MonotonicClock> {
    slots: RwLock<HashMap<K, Slot<V>>>,
    config: MemoConfig,
    clock: C,
}

impl<K, V> TtlMemo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a memo with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoConfig::default())
    }

    /// Creates a memo with custom configuration.
    pub fn with_config(config: MemoConfig) -> Self {
        Self::with_clock(config, MonotonicClock)
    }
}

impl<K, V> Default for TtlMemo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> TtlMemo<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Creates a memo reading time from `clock`.
    ///
    /// A `max_entries` of zero is raised to one.
    pub fn with_clock(mut config: MemoConfig, clock: C) -> Self {
        if config.validate().is_err() {
            warn!(max_entries = config.max_entries, "invalid memo capacity, using 1");
            config.max_entries = 1;
        }
        Self {
            slots: RwLock::new(HashMap::with_capacity(config.max_entries.min(1024))),
            config,
            clock,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    fn slot(&self, key: &K) -> Option<Slot<V>> {
        self.slots.read().get(key).cloned()
    }

    fn slot_or_insert(&self, key: K) -> Slot<V> {
        if let Some(slot) = self.slot(&key) {
            return slot;
        }

        let mut slots = self.slots.write();
        // Another writer may have added it while we waited for the lock.
        if let Some(slot) = slots.get(&key) {
            return Arc::clone(slot);
        }

        self.make_room(&mut slots, self.clock.now());
        let slot: Slot<V> = Arc::default();
        slots.insert(key, Arc::clone(&slot));
        slot
    }

    fn make_room(&self, slots: &mut HashMap<K, Slot<V>>, now: Instant) {
        if slots.len() < self.config.max_entries {
            return;
        }

        if self.config.auto_cleanup {
            slots.retain(|_, slot| !is_idle_and_stale(slot, now));
        }

        // Still at capacity? Remove oldest entry
        if slots.len() >= self.config.max_entries {
            let oldest_key = slots
                .iter()
                .filter_map(|(k, slot)| {
                    let entry = slot.try_lock()?;
                    let inserted_at = entry.as_ref().map(|e| e.inserted_at);
                    inserted_at.map(|at| (at, k.clone()))
                })
                .min_by_key(|(at, _)| *at)
                .map(|(_, k)| k);

            if let Some(oldest_key) = oldest_key {
                slots.remove(&oldest_key);
                debug!(max_entries = self.config.max_entries, "ttl memo evicted oldest entry");
            }
        }
    }

    /// Gets a fresh value by key. Returns None if absent or expired.
    ///
    /// Waits if a producer for this same key is running.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slot(key)?;
        let now = self.clock.now();
        let entry = slot.lock();
        entry
            .as_ref()
            .filter(|e| !e.is_expired_at(now))
            .map(|e| e.value.clone())
    }

    /// Returns the fresh value for `key`, computing it with the default TTL
    /// on a miss.
    pub fn get_or_compute<F>(&self, key: K, producer: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_compute_with_ttl(key, producer, self.config.default_ttl())
    }

    /// Returns the fresh value for `key`, computing it with `ttl` on a miss.
    pub fn get_or_compute_with_ttl<F>(&self, key: K, producer: F, ttl: Duration) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_compute_with_ttl(key, || Ok::<V, std::convert::Infallible>(producer()), ttl) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible [`get_or_compute`](Self::get_or_compute).
    pub fn try_get_or_compute<E, F>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.try_get_or_compute_with_ttl(key, producer, self.config.default_ttl())
    }

    /// Fallible [`get_or_compute_with_ttl`](Self::get_or_compute_with_ttl).
    ///
    /// On error nothing is stored and any previous entry for `key` is kept.
    pub fn try_get_or_compute_with_ttl<E, F>(&self, key: K, producer: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot_or_insert(key);
        let mut entry = slot.lock();

        let now = self.clock.now();
        if let Some(fresh) = entry.as_ref().filter(|e| !e.is_expired_at(now)) {
            trace!("ttl memo hit");
            return Ok(fresh.value.clone());
        }

        let value = match producer() {
            Ok(value) => value,
            Err(err) => {
                warn!(has_previous = entry.is_some(), "memo producer failed");
                return Err(err);
            }
        };

        debug!(ttl_ms = ttl_millis(ttl), "ttl memo recomputed");
        *entry = Some(MemoEntry {
            value: value.clone(),
            inserted_at: now,
            ttl,
        });
        Ok(value)
    }

    /// Stores a value with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.config.default_ttl());
    }

    /// Stores a value with a custom TTL.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let slot = self.slot_or_insert(key);
        let mut entry = slot.lock();
        *entry = Some(MemoEntry {
            value,
            inserted_at: self.clock.now(),
            ttl,
        });
    }

    /// Removes an entry, returning its value regardless of freshness.
    pub fn remove(&self, key: &K) -> Option<V> {
        let slot = self.slots.write().remove(key)?;
        let entry = slot.lock().take();
        entry.map(|e| e.value)
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Removes all expired entries.
    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.slots.write().retain(|_, slot| !is_idle_and_stale(slot, now));
    }

    /// Returns the number of stored keys, expired and pending ones included.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true if the memo is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Returns memo statistics.
    pub fn stats(&self) -> MemoStats {
        let now = self.clock.now();
        let slots = self.slots.read();
        let expired = slots.values().filter(|slot| is_idle_and_stale(slot, now)).count();
        MemoStats {
            total_entries: slots.len(),
            expired_entries: expired,
            valid_entries: slots.len().saturating_sub(expired),
            capacity: self.config.max_entries,
        }
    }
}

/// Memo statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStats {
    /// Stored keys, expired ones included
    pub total_entries: usize,
    /// Keys past their TTL (or never computed) but not yet cleaned up
    pub expired_entries: usize,
    /// Keys that would be served as hits
    pub valid_entries: usize,
    /// Configured maximum number of entries
    pub capacity: usize,
}
