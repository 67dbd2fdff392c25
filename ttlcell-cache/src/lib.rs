//! TTL-gated value cells.
//!
//! - [`TtlCell`]: one lazily recomputed value, single-threaded (`&mut self`)
//! - [`SharedTtlCell`]: the same contract behind a mutex for shared use
//! - [`TtlMemo`]: a bounded map of independently expiring values
//!
//! Expiry is checked on access only; nothing runs in the background.
//!
//! ```rust
//! use ttlcell_cache::TtlCell;
//!
//! let mut cell = TtlCell::new();
//! assert_eq!(*cell.get(|| "A"), "A");
//! assert_eq!(*cell.get(|| "B"), "A");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod cell;
mod memo;
mod shared;
mod stats;

pub use cell::TtlCell;
pub use memo::{MemoStats, TtlMemo};
pub use shared::SharedTtlCell;
pub use stats::CellStats;
