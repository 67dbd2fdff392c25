//! File polling through a TTL cell.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use ttlcell_cache::{CellStats, TtlCell};
use ttlcell_core::{Clock, MonotonicClock};

/// Outcome of one poll.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    /// The file was read this poll.
    Fresh(String),
    /// The cached contents were still within their TTL.
    Cached(String),
}

/// Re-reads a file at most once per TTL.
pub struct FileWatcher<C = MonotonicClock> {
    path: PathBuf,
    cell: TtlCell<String, C>,
}

impl FileWatcher {
    /// Creates a watcher for `path` on the system clock.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, MonotonicClock)
    }
}

impl<C: Clock> FileWatcher<C> {
    /// Creates a watcher reading time from `clock`.
    pub fn with_clock(path: impl Into<PathBuf>, ttl: Duration, clock: C) -> Self {
        Self {
            path: path.into(),
            cell: TtlCell::with_clock(clock, ttl),
        }
    }

    /// The watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the contents, reading the file only if the cached copy expired.
    ///
    /// A failed read leaves the previous contents in place.
    pub fn poll(&mut self) -> io::Result<Poll> {
        let misses = self.cell.stats().misses;
        let path = &self.path;
        let contents = self.cell.try_get(|| {
            debug!(path = %path.display(), "reading watched file");
            fs::read_to_string(path)
        })?;
        let contents = contents.clone();

        if self.cell.stats().misses > misses {
            Ok(Poll::Fresh(contents))
        } else {
            Ok(Poll::Cached(contents))
        }
    }

    /// The last successfully read contents, however old.
    pub fn last_contents(&self) -> Option<&str> {
        self.cell.last_value().map(String::as_str)
    }

    /// Access counters of the underlying cell.
    pub fn stats(&self) -> CellStats {
        self.cell.stats()
    }
}
