//! Download stage: writes chapter images to disk.
//!
//! Chapters are processed one after another; images of a chapter are fetched
//! concurrently through the [`ConcurrencyLimiter`]. Files are numbered across
//! the whole batch so chapter `k` continues where chapter `k - 1` stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::fetch::ImageFetcher;
use crate::format::sanitize;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::limiter::ConcurrencyLimiter;
use crate::model::{DownloadFailure, ImageInfo, PreparedChapter};
use crate::network::Connectivity;
use crate::progress::Progress;
use crate::session::SessionLog;
use crate::stats::{DownloadStats, StatsTracker};

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// First file number of every chapter, 1-based.
#[must_use]
pub fn chapter_offsets(chapters: &[PreparedChapter]) -> Vec<usize> {
    chapters
        .iter()
        .scan(1, |next, chapter| {
            let first = *next;
            *next += chapter.images.len();
            Some(first)
        })
        .collect()
}

/// Directory that receives a chapter's images.
#[must_use]
pub fn chapter_dir(output_dir: &Path, comic_title: &str, chapter_title: &str) -> PathBuf {
    output_dir
        .join(sanitize(comic_title))
        .join(sanitize(chapter_title))
}

/// Downloads prepared chapters and records failures into the session log.
pub struct DownloadPipeline<F: FileSystem = TokioFileSystem> {
    fetcher: Arc<dyn ImageFetcher>,
    connectivity: Arc<dyn Connectivity>,
    session_log: Arc<SessionLog>,
    progress: Arc<dyn Progress>,
    limiter: ConcurrencyLimiter,
    output_dir: PathBuf,
    cancel: CancellationToken,
    fs: F,
}

impl DownloadPipeline<TokioFileSystem> {
    /// Creates a pipeline writing with `tokio::fs`.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        connectivity: Arc<dyn Connectivity>,
        session_log: Arc<SessionLog>,
        progress: Arc<dyn Progress>,
        limiter: ConcurrencyLimiter,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_fs(
            fetcher,
            connectivity,
            session_log,
            progress,
            limiter,
            output_dir,
            TokioFileSystem,
        )
    }
}

impl<F: FileSystem> DownloadPipeline<F> {
    /// Creates a pipeline with a custom file system implementation.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_fs(
        fetcher: Arc<dyn ImageFetcher>,
        connectivity: Arc<dyn Connectivity>,
        session_log: Arc<SessionLog>,
        progress: Arc<dyn Progress>,
        limiter: ConcurrencyLimiter,
        output_dir: impl Into<PathBuf>,
        fs: F,
    ) -> Self {
        Self {
            fetcher,
            connectivity,
            session_log,
            progress,
            limiter,
            output_dir: output_dir.into(),
            cancel: CancellationToken::new(),
            fs,
        }
    }

    /// Stops the pipeline once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Downloads every chapter of `title`.
    ///
    /// Individual image failures are recorded in the session log and do not
    /// stop the run.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionInterrupted`] as soon as a failure coincides with
    ///   lost connectivity.
    /// - [`Error::Cancelled`] once the cancellation token fires. Images in
    ///   flight at that moment are abandoned.
    /// - I/O errors creating chapter directories.
    pub async fn start(&self, title: &str, chapters: &[PreparedChapter]) -> Result<DownloadStats> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.download_all(title, chapters) => result,
        }
    }

    async fn download_all(&self, title: &str, chapters: &[PreparedChapter]) -> Result<DownloadStats> {
        let stats = StatsTracker::new();
        self.progress.on_comic_start(title, chapters.len());

        for (chapter, first_number) in chapters.iter().zip(chapter_offsets(chapters)) {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.download_chapter(title, chapter, first_number, &stats)
                .await?;
            stats.record_chapter();
            self.progress.on_comic_advance();
        }

        self.progress.on_comic_complete();
        let stats = stats.snapshot();
        log::debug!(
            "Downloaded {} images ({} failed) in {} chapters",
            stats.images_downloaded,
            stats.images_failed,
            stats.chapters
        );
        Ok(stats)
    }

    async fn download_chapter(
        &self,
        title: &str,
        chapter: &PreparedChapter,
        first_number: usize,
        stats: &StatsTracker,
    ) -> Result<()> {
        let dir = chapter_dir(&self.output_dir, title, chapter.title());
        self.fs.create_dir_all(&dir).await?;

        self.progress
            .on_chapter_start(chapter.title(), chapter.images.len());

        let tasks = chapter.images.iter().enumerate().map(|(position, image)| {
            let path = dir.join(format!("{}.png", first_number + position));
            async move {
                let result = self.download_image(image, &path).await;
                self.handle_result(chapter, image, result, stats).await
            }
        });
        self.limiter.try_run(tasks).await?;

        self.progress.on_chapter_complete();
        Ok(())
    }

    async fn handle_result(
        &self,
        chapter: &PreparedChapter,
        image: &ImageInfo,
        result: Result<u64>,
        stats: &StatsTracker,
    ) -> Result<()> {
        match result {
            Ok(bytes) => {
                stats.record_image(bytes);
                self.session_log
                    .resolve_failed_download(chapter.title(), image);
            }
            Err(e) => {
                log::debug!(
                    "Image {} of {} failed: {e}",
                    image.index,
                    chapter.title()
                );
                self.session_log.register_failed_download(DownloadFailure {
                    chapter: chapter.chapter.clone(),
                    image: image.clone(),
                });
                stats.record_failure();
                if !self.connectivity.is_online().await {
                    return Err(Error::ConnectionInterrupted);
                }
            }
        }
        self.progress.on_chapter_advance();
        Ok(())
    }

    /// Fetches one image and writes it atomically (`.part` then rename).
    async fn download_image(&self, image: &ImageInfo, path: &Path) -> Result<u64> {
        let bytes = self.fetcher.fetch(&image.url).await?;
        let part = part_path(path);

        if let Err(e) = self.fs.write_file(&part, &bytes).await {
            let _ = self.fs.remove_file(&part).await;
            return Err(e.into());
        }
        self.fs.rename_file(&part, path).await?;
        Ok(bytes.len() as u64)
    }
}
