//! Interactive choices the pipelines ask the user for.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Chapter, DownloadOption};

/// Source of user decisions.
///
/// Implementations return [`Error::PromptCancelled`](crate::Error::PromptCancelled)
/// when the user aborts a prompt. Chapter numbers are 1-based and are
/// validated by the caller, which asks again when they are out of bounds.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// URL of the graphic novel to download.
    async fn get_url(&self) -> Result<String>;

    async fn get_download_option(&self, title: &str, chapter_count: usize)
    -> Result<DownloadOption>;

    /// 1-based number of the first chapter to download.
    async fn get_chapters_starting_at(&self, chapters: &[Chapter]) -> Result<usize>;

    /// 1-based number of the last chapter to download, given the start.
    async fn get_chapters_endpoint(&self, start: usize, chapters: &[Chapter]) -> Result<usize>;

    /// Titles of the chapters to download.
    async fn get_chapters_from_list(&self, chapters: &[Chapter]) -> Result<Vec<String>>;

    /// Whether to retry the `count` failed downloads of `title`.
    async fn should_retry_failed_downloads(&self, count: usize, title: &str) -> Result<bool>;

    /// Called when an answer was rejected, before asking again.
    fn on_invalid_input(&self, message: &str) {
        log::warn!("{message}");
    }
}

/// Parses a chapter selection such as `1,3,5-7` into 0-based indices.
///
/// Numbers are 1-based and must lie within `1..=len`. Duplicates are removed
/// and the result is sorted. Returns `None` on any malformed part.
#[must_use]
pub fn parse_selection(input: &str, len: usize) -> Option<Vec<usize>> {
    let in_bounds = |n: usize| (1..=len).contains(&n);
    let mut picked = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().ok()?;
            let end: usize = end.trim().parse().ok()?;
            if !in_bounds(start) || !in_bounds(end) || start > end {
                return None;
            }
            picked.extend(start - 1..end);
        } else {
            let n: usize = part.parse().ok()?;
            if !in_bounds(n) {
                return None;
            }
            picked.push(n - 1);
        }
    }

    picked.sort_unstable();
    picked.dedup();
    (!picked.is_empty()).then_some(picked)
}
