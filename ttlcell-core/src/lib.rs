//! # ttlcell Core
//!
//! Core types, errors, and configuration shared by the ttlcell crates.
//!
//! - **Clock**: monotonic time sources used for expiry checks
//! - **Config**: serializable TTL and memo settings
//! - **Errors**: error type with classification helpers
//! - **Constants**: defaults
//!
//! ## Example
//!
//! ```rust
//! use ttlcell_core::{TtlConfig, NegativeTtlPolicy};
//!
//! let config = TtlConfig::from_json(r#"{"default_ttl_ms": 250}"#).unwrap();
//! assert_eq!(config.default_ttl().as_millis(), 250);
//! assert_eq!(config.negative_ttl, NegativeTtlPolicy::Clamp);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ttl_from_millis, ttl_millis, MemoConfig, NegativeTtlPolicy, TtlConfig};
pub use constants::*;
pub use error::{Result, TtlError};
