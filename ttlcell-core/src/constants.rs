//! Default values for ttlcell.

use std::time::Duration;

/// Default validity window in milliseconds when the caller supplies none.
pub const DEFAULT_TTL_MS: u64 = 1000;

/// Default validity window as a [`Duration`].
pub const DEFAULT_TTL: Duration = Duration::from_millis(DEFAULT_TTL_MS);

/// Default capacity of a keyed memo.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
