//! Download statistics types.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Statistics for one run of the download pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Chapters processed.
    pub chapters: usize,
    /// Images written to disk.
    pub images_downloaded: usize,
    /// Images recorded as failed.
    pub images_failed: usize,
    /// Total bytes written.
    pub total_bytes: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl DownloadStats {
    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Collects statistics from concurrent download tasks.
#[derive(Debug)]
pub struct StatsTracker {
    start_time: Instant,
    chapters: AtomicUsize,
    downloaded: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            chapters: AtomicUsize::new(0),
            downloaded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn record_chapter(&self) {
        self.chapters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self, bytes: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DownloadStats {
        DownloadStats {
            chapters: self.chapters.load(Ordering::Relaxed),
            images_downloaded: self.downloaded.load(Ordering::Relaxed),
            images_failed: self.failed.load(Ordering::Relaxed),
            total_bytes: self.bytes.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}
