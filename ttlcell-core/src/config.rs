//! Configuration for cells and memos.
//!
//! All settings deserialize with defaults for missing fields, so a partial
//! JSON document (or an empty object) yields a usable configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_MS};
use crate::error::{Result, TtlError};

/// How a negative TTL coming from a signed millisecond input is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeTtlPolicy {
    /// Treat it as zero: every access recomputes.
    #[default]
    Clamp,
    /// Fail with [`TtlError::NegativeTtl`].
    Reject,
}

/// Converts a signed millisecond TTL into a [`Duration`] under `policy`.
pub fn ttl_from_millis(millis: i64, policy: NegativeTtlPolicy) -> Result<Duration> {
    match u64::try_from(millis) {
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => match policy {
            NegativeTtlPolicy::Clamp => Ok(Duration::ZERO),
            NegativeTtlPolicy::Reject => Err(TtlError::NegativeTtl(millis)),
        },
    }
}

/// Milliseconds in `ttl` for log fields, saturating at `u64::MAX`.
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Settings for a single TTL cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// TTL in milliseconds used when the caller supplies none
    pub default_ttl_ms: u64,
    /// Handling of negative TTL inputs
    pub negative_ttl: NegativeTtlPolicy,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            negative_ttl: NegativeTtlPolicy::default(),
        }
    }
}

impl TtlConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// The default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Converts a signed millisecond TTL under this config's policy.
    pub fn resolve_ttl_millis(&self, millis: i64) -> Result<Duration> {
        ttl_from_millis(millis, self.negative_ttl)
    }
}

/// Settings for a keyed memo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Default TTL in milliseconds
    pub default_ttl_ms: u64,
    /// Whether to drop expired entries before evicting live ones
    pub auto_cleanup: bool,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_ms: DEFAULT_TTL_MS,
            auto_cleanup: true,
        }
    }
}

impl MemoConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(TtlError::ConfigError("max_entries must be at least 1".into()));
        }
        Ok(())
    }

    /// The default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}
