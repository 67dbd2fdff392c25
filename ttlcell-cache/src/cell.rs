//! Single-value TTL cell.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use ttlcell_core::{ttl_millis, Clock, MonotonicClock, TtlConfig, DEFAULT_TTL};

use crate::stats::CellStats;

/// A computed value with its validity window.
#[derive(Clone, Debug)]
struct Slot<T> {
    value: T,
    computed_at: Instant,
    /// `None` when `computed_at + ttl` is not representable: never expires.
    valid_until: Option<Instant>,
}

impl<T> Slot<T> {
    fn is_fresh_at(&self, now: Instant) -> bool {
        self.valid_until.map_or(true, |until| now < until)
    }
}

/// Holds at most one value and recomputes it once its TTL has elapsed.
///
/// The cell starts empty. Every access reads the clock and compares against
/// the stored deadline: a fresh value is returned as-is, otherwise the
/// producer runs inline and its result replaces the old value. There is no
/// timer; a stale value simply sits until the next access.
///
/// The TTL passed to an access only matters when that access recomputes: it
/// sets the deadline for the value it produced. Hits never move the deadline.
///
/// # Failures
///
/// With [`try_get`](Self::try_get) a failing producer leaves the cell exactly
/// as it was. The previous value (stale or not) stays available through
/// [`last_value`](Self::last_value), and the next access retries.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ttlcell_cache::TtlCell;
/// use ttlcell_core::ManualClock;
///
/// let clock = ManualClock::new();
/// let mut cell = TtlCell::with_clock(clock.clone(), Duration::from_millis(1000));
///
/// assert_eq!(*cell.get(|| 'A'), 'A');
/// clock.advance_millis(500);
/// assert_eq!(*cell.get(|| 'B'), 'A');
/// clock.advance_millis(1000);
/// assert_eq!(*cell.get(|| 'C'), 'C');
/// ```
#[derive(Debug)]
pub struct TtlCell<T, C = MonotonicClock> {
    slot: Option<Slot<T>>,
    default_ttl: Duration,
    clock: C,
    stats: CellStats,
}

impl<T> TtlCell<T> {
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

impl<T> Default for TtlCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> TtlCell<T, C> {
    /// Creates an empty cell reading time from `clock`.
    pub fn with_clock(clock: C, default_ttl: Duration) -> Self {
        Self {
            slot: None,
            default_ttl,
            clock,
            stats: CellStats::default(),
        }
    }

    /// TTL used by [`get`](Self::get) and [`try_get`](Self::try_get).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the cached value, recomputing it with the default TTL if stale.
    pub fn get<F>(&mut self, producer: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.get_with_ttl(producer, self.default_ttl)
    }

    /// Returns the cached value, recomputing it with `ttl` if stale.
    pub fn get_with_ttl<F>(&mut self, producer: F, ttl: Duration) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.try_get_with_ttl(|| Ok::<T, Infallible>(producer()), ttl) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible [`get`](Self::get).
    pub fn try_get<E, F>(&mut self, producer: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.try_get_with_ttl(producer, self.default_ttl)
    }

    /// Fallible [`get_with_ttl`](Self::get_with_ttl).
    ///
    /// On error the cell is untouched and the error is returned as-is.
    pub fn try_get_with_ttl<E, F>(&mut self, producer: F, ttl: Duration) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let now = self.clock.now();

        let slot = match self.slot.take() {
            Some(slot) if slot.is_fresh_at(now) => {
                self.stats.hits += 1;
                trace!("ttl cell hit");
                slot
            }
            previous => {
                // The previous value stays in place while the producer runs.
                let has_previous = previous.is_some();
                self.slot = previous;

                let value = match producer() {
                    Ok(value) => value,
                    Err(err) => {
                        self.stats.failures += 1;
                        warn!(has_previous, "producer failed");
                        return Err(err);
                    }
                };
                self.stats.misses += 1;
                debug!(ttl_ms = ttl_millis(ttl), first = !has_previous, "ttl cell recomputed");
                Slot {
                    value,
                    computed_at: now,
                    valid_until: now.checked_add(ttl),
                }
            }
        };

        Ok(&self.slot.insert(slot).value)
    }

    /// Returns the value only if it is still fresh. Never computes.
    pub fn peek(&self) -> Option<&T> {
        let now = self.clock.now();
        self.slot
            .as_ref()
            .filter(|slot| slot.is_fresh_at(now))
            .map(|slot| &slot.value)
    }

    /// Returns the last successfully computed value, fresh or stale.
    pub fn last_value(&self) -> Option<&T> {
        self.slot.as_ref().map(|slot| &slot.value)
    }

    /// Returns true if a value is cached and has not expired.
    pub fn is_fresh(&self) -> bool {
        self.peek().is_some()
    }

    /// Returns true if no value has been computed (or the cell was cleared).
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// When the current value was computed.
    pub fn computed_at(&self) -> Option<Instant> {
        self.slot.as_ref().map(|slot| slot.computed_at)
    }

    /// When the current value expires.
    ///
    /// `None` if the cell is empty or the TTL is too large to represent, in
    /// which case the value never expires.
    pub fn valid_until(&self) -> Option<Instant> {
        self.slot.as_ref().and_then(|slot| slot.valid_until)
    }

    /// Marks the value stale so the next access recomputes. Keeps the value.
    pub fn invalidate(&mut self) {
        let now = self.clock.now();
        if let Some(slot) = self.slot.as_mut() {
            slot.valid_until = Some(now);
        }
    }

    /// Empties the cell, handing back the cached value.
    pub fn clear(&mut self) -> Option<T> {
        self.slot.take().map(|slot| slot.value)
    }

    /// Returns access counters.
    pub fn stats(&self) -> CellStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;
    use ttlcell_core::ManualClock;

    fn manual_cell<T>(ttl_ms: u64) -> (ManualClock, TtlCell<T, ManualClock>) {
        let clock = ManualClock::new();
        let cell = TtlCell::with_clock(clock.clone(), Duration::from_millis(ttl_ms));
        (clock, cell)
    }

    #[test]
    fn test_cell_scenario() {
        let (clock, mut cell) = manual_cell(1000);
        let mut calls = 0;

        assert_eq!(*cell.get(|| { calls += 1; "A" }), "A");
        assert_eq!(calls, 1);

        clock.advance_millis(500);
        assert_eq!(*cell.get(|| { calls += 1; "B" }), "A");
        assert_eq!(calls, 1);

        clock.advance_millis(1000);
        assert_eq!(*cell.get(|| { calls += 1; "C" }), "C");
        assert_eq!(calls, 2);
    }

    #[test_case(0 ; "zero ttl")]
    #[test_case(1000 ; "default ttl")]
    #[test_case(u64::MAX ; "huge ttl")]
    fn test_first_call_always_computes(ttl_ms: u64) {
        let (_clock, mut cell) = manual_cell::<u32>(ttl_ms);
        let mut calls = 0;
        assert_eq!(*cell.get(|| { calls += 1; 7 }), 7);
        assert_eq!(calls, 1);
    }

    #[test_case(999, false ; "just before expiry is a hit")]
    #[test_case(1000, true ; "exactly at expiry recomputes")]
    #[test_case(1001, true ; "after expiry recomputes")]
    fn test_expiry_boundary(elapsed_ms: u64, recomputes: bool) {
        let (clock, mut cell) = manual_cell(1000);
        cell.get(|| 1);
        clock.advance_millis(elapsed_ms);
        let value = *cell.get(|| 2);
        assert_eq!(value == 2, recomputes);
    }

    #[test]
    fn test_no_duplicate_computation_on_hit() {
        let (clock, mut cell) = manual_cell(1000);
        let mut calls = 0;
        for _ in 0..50 {
            cell.get(|| { calls += 1; calls });
            clock.advance_millis(10);
        }
        assert_eq!(calls, 1);
        assert_eq!(cell.stats().hits, 49);
        assert_eq!(cell.stats().misses, 1);
    }

    #[test]
    fn test_zero_ttl_always_recomputes() {
        let (_clock, mut cell) = manual_cell(0);
        let mut calls = 0;
        for _ in 0..3 {
            cell.get(|| { calls += 1; calls });
        }
        assert_eq!(calls, 3);
        assert_eq!(*cell.get(|| 99), 99);
    }

    #[test]
    fn test_ttl_of_recompute_sets_deadline() {
        let (clock, mut cell) = manual_cell(1000);
        cell.get_with_ttl(|| "short", Duration::from_millis(100));

        // A hit with a longer ttl does not extend the window.
        clock.advance_millis(50);
        assert_eq!(*cell.get_with_ttl(|| "long", Duration::from_millis(5000)), "short");

        clock.advance_millis(50);
        assert_eq!(*cell.get_with_ttl(|| "long", Duration::from_millis(5000)), "long");
        clock.advance_millis(4000);
        assert_eq!(*cell.get(|| "default"), "long");
    }

    #[test]
    fn test_failure_keeps_previous_value() {
        let (clock, mut cell) = manual_cell(1000);
        cell.get(|| String::from("A"));
        let computed_at = cell.computed_at();

        clock.advance_millis(1500);
        let err = cell.try_get(|| Err::<String, _>("backend down")).unwrap_err();
        assert_eq!(err, "backend down");
        assert_eq!(cell.last_value().map(String::as_str), Some("A"));
        assert_eq!(cell.computed_at(), computed_at);
        assert!(!cell.is_fresh());

        let prior = cell.last_value().cloned();
        let value = cell.try_get(|| prior.ok_or("empty")).unwrap();
        assert_eq!(value, "A");
        assert!(cell.is_fresh());
        assert_eq!(cell.stats().failures, 1);
    }

    #[test]
    fn test_failure_on_empty_cell_stays_empty() {
        let (_clock, mut cell) = manual_cell::<u8>(1000);
        assert!(cell.try_get(|| Err::<u8, _>(())).is_err());
        assert!(cell.is_empty());
        assert_eq!(*cell.get(|| 3), 3);
        assert_eq!(cell.stats().failures, 1);
        assert_eq!(cell.stats().misses, 1);
    }

    #[test]
    fn test_hit_and_miss_counters_through_try_get() {
        let (clock, mut cell) = manual_cell(100);
        assert_eq!(cell.try_get(|| Ok::<_, ()>(1)), Ok(&1));
        assert_eq!(cell.try_get(|| Ok::<_, ()>(2)), Ok(&1));
        clock.advance_millis(100);
        assert_eq!(cell.try_get(|| Err::<i32, _>(())), Err(()));
        assert_eq!(cell.try_get(|| Ok::<_, ()>(3)), Ok(&3));

        let stats = cell.stats();
        assert_eq!((stats.hits, stats.misses, stats.failures), (1, 2, 1));
    }

    #[test]
    fn test_panicking_producer_keeps_previous_value() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let (clock, mut cell) = manual_cell(100);
        cell.get(|| 1);
        clock.advance_millis(100);

        let result = catch_unwind(AssertUnwindSafe(|| {
            cell.get(|| panic!("producer blew up"));
        }));
        assert!(result.is_err());
        assert_eq!(cell.last_value(), Some(&1));
        assert_eq!(*cell.get(|| 2), 2);
    }

    #[test]
    fn test_peek_never_computes() {
        let (clock, mut cell) = manual_cell(1000);
        assert!(cell.peek().is_none());
        cell.get(|| 5);
        assert_eq!(cell.peek(), Some(&5));
        clock.advance_millis(1000);
        assert!(cell.peek().is_none());
        assert_eq!(cell.last_value(), Some(&5));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_clock, mut cell) = manual_cell(1000);
        cell.get(|| 1);
        cell.invalidate();
        assert!(!cell.is_fresh());
        assert_eq!(*cell.get(|| 2), 2);

        assert_eq!(cell.clear(), Some(2));
        assert!(cell.is_empty());
        assert!(cell.valid_until().is_none());
        assert_eq!(*cell.get(|| 3), 3);
    }

    #[test]
    fn test_valid_until_tracks_ttl() {
        let (_clock, mut cell) = manual_cell(1000);
        cell.get_with_ttl(|| (), Duration::from_millis(250));
        let computed = cell.computed_at().unwrap();
        assert_eq!(cell.valid_until(), Some(computed + Duration::from_millis(250)));
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let (clock, mut cell) = manual_cell(1000);
        cell.get_with_ttl(|| 1, Duration::MAX);
        assert!(cell.valid_until().is_none());
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(*cell.get(|| 2), 1);
    }

    #[test]
    fn test_default_cell_uses_default_ttl() {
        let cell: TtlCell<()> = TtlCell::default();
        assert_eq!(cell.default_ttl(), DEFAULT_TTL);

        let config = TtlConfig {
            default_ttl_ms: 42,
            ..TtlConfig::default()
        };
        let cell: TtlCell<()> = TtlCell::from_config(&config);
        assert_eq!(cell.default_ttl(), Duration::from_millis(42));
    }

    proptest! {
        // Replays random (advance, ttl) steps against a model of the deadline.
        #[test]
        fn prop_freshness_bound(steps in proptest::collection::vec((0u64..3000, 0u64..2000), 1..64)) {
            let (clock, mut cell) = manual_cell::<usize>(1000);
            let start = clock.now();
            let mut deadline: Option<Instant> = None;
            let mut last_computed: Option<Instant> = None;
            let mut calls = 0usize;

            for (i, (advance_ms, ttl_ms)) in steps.into_iter().enumerate() {
                clock.advance_millis(advance_ms);
                let now = clock.now();
                let ttl = Duration::from_millis(ttl_ms);
                let expect_miss = deadline.map_or(true, |d| now >= d);

                let before = calls;
                let value = *cell.get_with_ttl(|| { calls += 1; i }, ttl);

                if expect_miss {
                    prop_assert_eq!(calls, before + 1);
                    prop_assert_eq!(value, i);
                    deadline = Some(now + ttl);
                    last_computed = Some(now);
                } else {
                    prop_assert_eq!(calls, before);
                    prop_assert!(value < i);
                }

                // Never older than its own window.
                let computed = last_computed.unwrap_or(start);
                prop_assert!(now >= computed);
                prop_assert_eq!(cell.computed_at(), last_computed);
            }
        }
    }
}
