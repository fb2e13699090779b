//! Decides between a fresh crawl and a retry of logged failures.

use crate::error::Result;
use crate::model::{DownloadFailure, PreparedChapter};
use crate::prompt::Prompt;
use crate::session::SessionLog;

/// Failed chapters to download again, rebuilt from the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    /// Comic title recorded by the previous run.
    pub title: String,
    pub chapters: Vec<PreparedChapter>,
}

impl RetryPlan {
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.chapters.iter().map(|c| c.images.len()).sum()
    }

    /// Every image of the plan as a failure, in plan order.
    #[must_use]
    pub fn pending(&self) -> Vec<DownloadFailure> {
        self.chapters
            .iter()
            .flat_map(|c| {
                c.images.iter().map(|image| DownloadFailure {
                    chapter: c.chapter.clone(),
                    image: image.clone(),
                })
            })
            .collect()
    }
}

/// Outcome of mode selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Crawl, select, then download.
    Fresh,
    /// Download only what the previous run failed to.
    Retry(RetryPlan),
}

/// Reads the session log once and picks the run mode.
pub struct ModeSelector<'a> {
    session_log: &'a SessionLog,
    prompt: &'a dyn Prompt,
}

impl<'a> ModeSelector<'a> {
    #[must_use]
    pub const fn new(session_log: &'a SessionLog, prompt: &'a dyn Prompt) -> Self {
        Self {
            session_log,
            prompt,
        }
    }

    /// # Errors
    ///
    /// - [`Error::LogFileCorrupted`](crate::Error::LogFileCorrupted) if the
    ///   log is unreadable or structurally invalid.
    /// - Prompt errors while asking about the retry.
    pub async fn select(&self) -> Result<Mode> {
        let content = self.session_log.read()?;
        let failed = content.failed_downloads.image_count();
        if failed == 0 {
            return Ok(Mode::Fresh);
        }

        let title = content.comic.title;
        if !self
            .prompt
            .should_retry_failed_downloads(failed, &title)
            .await?
        {
            log::debug!("Retry of {failed} failed downloads declined");
            return Ok(Mode::Fresh);
        }

        let chapters = content.failed_downloads.to_prepared();
        log::info!(
            "Retrying {failed} failed downloads across {} chapters.",
            chapters.len()
        );
        Ok(Mode::Retry(RetryPlan { title, chapters }))
    }
}
