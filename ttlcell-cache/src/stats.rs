use serde::{Deserialize, Serialize};

/// Access counters for a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStats {
    /// Accesses served from the cached value
    pub hits: u64,
    /// Accesses that ran the producer successfully
    pub misses: u64,
    /// Accesses whose producer returned an error
    pub failures: u64,
}

impl CellStats {
    /// Total number of accesses that went through `get`/`try_get`.
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses + self.failures
    }

    /// Fraction of accesses served from cache, `0.0` when unused.
    pub fn hit_ratio(&self) -> f64 {
        match self.accesses() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}
