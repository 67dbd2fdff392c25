//! Thread-safe TTL cell.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use ttlcell_core::{Clock, MonotonicClock, TtlConfig, DEFAULT_TTL};

use crate::cell::TtlCell;
use crate::stats::CellStats;

/// A [`TtlCell`] that can be shared between threads.
///
/// The lock is held across the whole check → produce → store sequence, so
/// when several threads find the value stale only the first one runs the
/// producer; the others wait and then get the value it stored. Values are
/// handed out as `Arc<T>`: every caller inside one window sees the same
/// allocation.
///
/// The lock is not reentrant. A producer must not access the cell it is
/// producing for.
#[derive(Debug)]
pub struct SharedTtlCell<T, C = MonotonicClock> {
    inner: Mutex<TtlCell<Arc<T>, C>>,
}

impl<T> SharedTtlCell<T> {
    /// Creates an empty cell with the default 1s TTL.
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    /// Creates an empty cell with a custom default TTL.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self::with_clock(MonotonicClock, ttl)
    }

    /// Creates an empty cell from configuration.
    pub fn from_config(config: &TtlConfig) -> Self {
        Self::with_default_ttl(config.default_ttl())
    }
}

impl<T> Default for SharedTtlCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> SharedTtlCell<T, C> {
    /// Creates an empty cell reading time from `clock`.
    pub fn with_clock(clock: C, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(TtlCell::with_clock(clock, default_ttl)),
        }
    }

    /// Returns the cached value, recomputing it with the default TTL if stale.
    pub fn get<F>(&self, producer: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut cell = self.inner.lock();
        let ttl = cell.default_ttl();
        Arc::clone(cell.get_with_ttl(|| Arc::new(producer()), ttl))
    }

    /// Returns the cached value, recomputing it with `ttl` if stale.
    pub fn get_with_ttl<F>(&self, producer: F, ttl: Duration) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        Arc::clone(self.inner.lock().get_with_ttl(|| Arc::new(producer()), ttl))
    }

    /// Fallible [`get`](Self::get). The cell is untouched on error.
    pub fn try_get<E, F>(&self, producer: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut cell = self.inner.lock();
        let ttl = cell.default_ttl();
        cell.try_get_with_ttl(|| producer().map(Arc::new), ttl)
            .map(Arc::clone)
    }

    /// Fallible [`get_with_ttl`](Self::get_with_ttl).
    pub fn try_get_with_ttl<E, F>(&self, producer: F, ttl: Duration) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.inner
            .lock()
            .try_get_with_ttl(|| producer().map(Arc::new), ttl)
            .map(Arc::clone)
    }

    /// Returns the value only if it is still fresh.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.inner.lock().peek().cloned()
    }

    /// Returns the last successfully computed value, fresh or stale.
    pub fn last_value(&self) -> Option<Arc<T>> {
        self.inner.lock().last_value().cloned()
    }

    /// Returns true if a value is cached and has not expired.
    pub fn is_fresh(&self) -> bool {
        self.inner.lock().is_fresh()
    }

    /// When the current value expires, see [`TtlCell::valid_until`].
    pub fn valid_until(&self) -> Option<Instant> {
        self.inner.lock().valid_until()
    }

    /// Marks the value stale so the next access recomputes.
    pub fn invalidate(&self) {
        self.inner.lock().invalidate();
    }

    /// Empties the cell, handing back the cached value.
    pub fn clear(&self) -> Option<Arc<T>> {
        self.inner.lock().clear()
    }

    /// Returns access counters.
    pub fn stats(&self) -> CellStats {
        self.inner.lock().stats()
    }
}
