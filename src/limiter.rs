//! Bounded concurrency for the preparation and download stages.
//!
//! The limit is derived from total physical memory so small hosts are not
//! flooded with sockets and buffers while large hosts still get throughput.

use std::future::Future;
use std::sync::OnceLock;

use futures::{StreamExt, TryStreamExt, stream};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const GIB: u64 = 1024 * 1024 * 1024;

/// Memory thresholds in GiB and the limit used below each of them.
const MEMORY_TIERS: [(u64, usize); 5] = [(8, 1), (16, 2), (32, 5), (64, 10), (128, 15)];

/// Limit used at or above the last tier.
const MAX_CONCURRENCY: usize = 20;

/// Maps total physical memory (bytes) to a concurrency level.
#[must_use]
pub fn concurrency_for_memory(total_bytes: u64) -> usize {
    MEMORY_TIERS
        .iter()
        .find(|(gib, _)| total_bytes < gib * GIB)
        .map_or(MAX_CONCURRENCY, |&(_, level)| level)
}

/// Concurrency level for this host, computed once per process.
#[must_use]
pub fn system_concurrency() -> usize {
    static LEVEL: OnceLock<usize> = OnceLock::new();
    *LEVEL.get_or_init(|| {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        let level = concurrency_for_memory(sys.total_memory());
        log::debug!(
            "Concurrency level {level} for {} bytes of memory",
            sys.total_memory()
        );
        level
    })
}

/// Runs batches of futures with at most `limit` in flight.
///
/// Futures beyond the limit wait their turn; results come back in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimiter {
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with an explicit limit (clamped to at least 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Creates a limiter sized from host memory.
    #[must_use]
    pub fn from_system() -> Self {
        Self::new(system_concurrency())
    }

    /// Uses `limit` when given, otherwise the memory policy.
    #[must_use]
    pub fn from_override(limit: Option<usize>) -> Self {
        limit.map_or_else(Self::from_system, Self::new)
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Runs every task and returns their outputs aligned to input order.
    pub async fn run<I, F, T>(&self, tasks: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        stream::iter(tasks).buffered(self.limit).collect().await
    }

    /// Like [`run`](Self::run) but stops at the first error.
    ///
    /// Tasks still in flight when an error arrives are dropped and queued
    /// tasks never start.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by any task.
    pub async fn try_run<I, F, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        stream::iter(tasks).buffered(self.limit).try_collect().await
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::from_system()
    }
}
