//! Preparation stage: resolve title, chapters, selection and image links.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::crawl::{Crawler, CrawlerRegistry};
use crate::error::{Error, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::model::{Chapter, PreparedChapter};
use crate::network::Connectivity;
use crate::progress::Progress;
use crate::prompt::Prompt;
use crate::selector::select_chapters;

/// Result of a successful preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub url: String,
    pub title: String,
    pub chapters: Vec<PreparedChapter>,
}

/// Produces chapters ready for download.
///
/// Owns the crawler for the duration of [`start`](Self::start) and releases
/// it before returning, whether preparation succeeded or not.
pub struct PreparationPipeline {
    registry: Arc<CrawlerRegistry>,
    prompt: Arc<dyn Prompt>,
    progress: Arc<dyn Progress>,
    connectivity: Arc<dyn Connectivity>,
    limiter: ConcurrencyLimiter,
    cancel: CancellationToken,
    crawler: Option<Box<dyn Crawler>>,
}

impl PreparationPipeline {
    #[must_use]
    pub fn new(
        registry: Arc<CrawlerRegistry>,
        prompt: Arc<dyn Prompt>,
        progress: Arc<dyn Progress>,
        connectivity: Arc<dyn Connectivity>,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self {
            registry,
            prompt,
            progress,
            connectivity,
            limiter,
            cancel: CancellationToken::new(),
            crawler: None,
        }
    }

    /// Abandons preparation as soon as `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs the whole preparation.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyGraphicNovel`] if the comic has no chapters.
    /// - [`Error::ConnectionInterrupted`] if extraction failed and the network
    ///   is unreachable.
    /// - [`Error::Cancelled`] if the cancellation token fires first.
    /// - Prompt, registry and extraction errors otherwise.
    pub async fn start(&mut self) -> Result<Prepared> {
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.acquire_and_prepare() => result,
        };
        self.release().await;
        result
    }

    /// Terminates the crawler if one is held. Safe to call repeatedly.
    pub async fn release(&mut self) {
        if let Some(crawler) = self.crawler.take() {
            crawler.terminate().await;
        }
    }

    async fn acquire_and_prepare(&mut self) -> Result<Prepared> {
        let url = self.prompt.get_url().await?;
        self.crawler = Some(self.registry.create(&url)?);
        self.prepare(url).await
    }

    async fn prepare(&self, url: String) -> Result<Prepared> {
        let crawler = self
            .crawler
            .as_deref()
            .ok_or_else(|| Error::CrawlerInitializationFailed("no crawler".into()))?;

        let title = self.guard(crawler.extract_title(&url).await).await?;
        log::info!("Requesting chapter list. This may take a moment.");
        let chapters = self.guard(crawler.extract_chapters(&url).await).await?;
        if chapters.is_empty() {
            return Err(Error::EmptyGraphicNovel { title });
        }
        log::info!("Found {} chapters for {title}.", chapters.len());

        let option = self
            .prompt
            .get_download_option(&title, chapters.len())
            .await?;
        let selected = select_chapters(&chapters, option, self.prompt.as_ref()).await?;

        let prepared = self.resolve_images(crawler, &title, selected).await?;
        Ok(Prepared {
            url,
            title,
            chapters: prepared,
        })
    }

    async fn resolve_images(
        &self,
        crawler: &dyn Crawler,
        title: &str,
        chapters: Vec<Chapter>,
    ) -> Result<Vec<PreparedChapter>> {
        self.progress.on_preparation_start(title, chapters.len());

        let tasks = chapters.into_iter().map(|chapter| async move {
            let links = crawler.extract_image_links(&chapter.url).await;
            self.progress.on_preparation_advance();
            let links = self.guard(links).await?;
            log::debug!("{}: {} images", chapter.title, links.len());
            Ok::<_, Error>(PreparedChapter::from_links(chapter, links))
        });
        let prepared = self.limiter.try_run(tasks).await?;

        self.progress.on_preparation_complete();
        Ok(prepared)
    }

    /// Reports extraction failures as a lost connection when the network is down.
    async fn guard<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if self.connectivity.is_online().await => Err(e),
            Err(e) => {
                log::debug!("Extraction failed while offline: {e}");
                Err(Error::ConnectionInterrupted)
            }
        }
    }
}
