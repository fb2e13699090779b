//! Scripted collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::crawl::{Crawler, CrawlerRegistry};
use crate::error::{Error, Result};
use crate::fetch::ImageFetcher;
use crate::model::{Chapter, DownloadOption, ImageInfo, PreparedChapter};
use crate::network::Connectivity;
use crate::progress::Progress;
use crate::prompt::Prompt;

pub const COMIC_URL: &str = "https://bato.to/series/1";

/// `n` chapters titled `Chapter 1..=n`.
pub fn chapters(n: usize) -> Vec<Chapter> {
    (1..=n)
        .map(|i| Chapter::new(format!("Chapter {i}"), format!("https://bato.to/chapter/{i}")))
        .collect()
}

fn image_links(chapter_url: &str, count: usize) -> Vec<String> {
    (0..count).map(|k| format!("{chapter_url}/{k}.png")).collect()
}

/// Prepared chapters with the given image counts, URLs as [`MockCrawler`] makes them.
pub fn prepared(image_counts: &[usize]) -> Vec<PreparedChapter> {
    chapters(image_counts.len())
        .into_iter()
        .zip(image_counts)
        .map(|(chapter, &count)| {
            let links = image_links(&chapter.url, count);
            PreparedChapter::from_links(chapter, links)
        })
        .collect()
}

// =============================================================================
// Prompt
// =============================================================================

/// Answers prompts from queues. An exhausted queue cancels the prompt.
pub struct ScriptedPrompt {
    url: Option<String>,
    option: DownloadOption,
    starts: Mutex<VecDeque<usize>>,
    ends: Mutex<VecDeque<usize>>,
    selection: Vec<String>,
    retry: bool,
    retry_asked: AtomicUsize,
    rejections: AtomicUsize,
}

impl Default for ScriptedPrompt {
    fn default() -> Self {
        Self {
            url: Some(COMIC_URL.to_string()),
            option: DownloadOption::All,
            starts: Mutex::new(VecDeque::new()),
            ends: Mutex::new(VecDeque::new()),
            selection: Vec::new(),
            retry: false,
            retry_asked: AtomicUsize::new(0),
            rejections: AtomicUsize::new(0),
        }
    }
}

impl ScriptedPrompt {
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn cancel_url(mut self) -> Self {
        self.url = None;
        self
    }

    pub fn with_option(mut self, option: DownloadOption) -> Self {
        self.option = option;
        self
    }

    pub fn with_starts(self, starts: impl IntoIterator<Item = usize>) -> Self {
        self.starts.lock().unwrap().extend(starts);
        self
    }

    pub fn with_ends(self, ends: impl IntoIterator<Item = usize>) -> Self {
        self.ends.lock().unwrap().extend(ends);
        self
    }

    pub fn with_selection<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = titles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::SeqCst)
    }

    pub fn retry_asked(&self) -> usize {
        self.retry_asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn get_url(&self) -> Result<String> {
        self.url.clone().ok_or(Error::PromptCancelled)
    }

    async fn get_download_option(&self, _title: &str, _count: usize) -> Result<DownloadOption> {
        Ok(self.option)
    }

    async fn get_chapters_starting_at(&self, _chapters: &[Chapter]) -> Result<usize> {
        self.starts.lock().unwrap().pop_front().ok_or(Error::PromptCancelled)
    }

    async fn get_chapters_endpoint(&self, _start: usize, _chapters: &[Chapter]) -> Result<usize> {
        self.ends.lock().unwrap().pop_front().ok_or(Error::PromptCancelled)
    }

    async fn get_chapters_from_list(&self, _chapters: &[Chapter]) -> Result<Vec<String>> {
        Ok(self.selection.clone())
    }

    async fn should_retry_failed_downloads(&self, _count: usize, _title: &str) -> Result<bool> {
        self.retry_asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.retry)
    }

    fn on_invalid_input(&self, _message: &str) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Crawler
// =============================================================================

#[derive(Default)]
struct CrawlerCalls {
    title: AtomicUsize,
    image_links: AtomicUsize,
    terminations: AtomicUsize,
}

/// In-memory crawler. Clones share call counters.
#[derive(Clone)]
pub struct MockCrawler {
    title: String,
    chapters: Vec<Chapter>,
    images_per_chapter: usize,
    fail_images: bool,
    calls: Arc<CrawlerCalls>,
}

impl MockCrawler {
    pub fn new(title: &str, chapters: Vec<Chapter>) -> Self {
        Self {
            title: title.to_string(),
            chapters,
            images_per_chapter: 0,
            fail_images: false,
            calls: Arc::default(),
        }
    }

    pub fn with_images(mut self, per_chapter: usize) -> Self {
        self.images_per_chapter = per_chapter;
        self
    }

    pub fn failing_images(mut self) -> Self {
        self.fail_images = true;
        self
    }

    pub fn title_calls(&self) -> usize {
        self.calls.title.load(Ordering::SeqCst)
    }

    pub fn image_link_calls(&self) -> usize {
        self.calls.image_links.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.calls.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    async fn extract_title(&self, _url: &str) -> Result<String> {
        self.calls.title.fetch_add(1, Ordering::SeqCst);
        Ok(self.title.clone())
    }

    async fn extract_chapters(&self, _url: &str) -> Result<Vec<Chapter>> {
        Ok(self.chapters.clone())
    }

    async fn extract_image_links(&self, chapter_url: &str) -> Result<Vec<String>> {
        self.calls.image_links.fetch_add(1, Ordering::SeqCst);
        if self.fail_images {
            return Err(Error::Extraction(format!("no images at {chapter_url}")));
        }
        Ok(image_links(chapter_url, self.images_per_chapter))
    }

    async fn terminate(&self) {
        self.calls.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry serving `crawler` for Bato URLs.
pub fn registry_with(crawler: &MockCrawler) -> CrawlerRegistry {
    let crawler = crawler.clone();
    CrawlerRegistry::new().register(
        "Mock",
        ["https://bato.to"],
        Arc::new(move || Ok(Box::new(crawler.clone()) as Box<dyn Crawler>)),
    )
}

// =============================================================================
// Network and fetching
// =============================================================================

/// Connectivity with a fixed answer.
pub struct FixedConnectivity {
    online: bool,
}

impl FixedConnectivity {
    pub fn new(online: bool) -> Self {
        Self { online }
    }
}

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> bool {
        self.online
    }
}

/// Returns each URL's bytes as the image body, failing the listed URLs.
#[derive(Default)]
pub struct ScriptedFetcher {
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
}

impl ScriptedFetcher {
    pub fn failing<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: urls.into_iter().map(Into::into).collect(),
            fetched: Mutex::default(),
            cancel_on: Mutex::default(),
        }
    }

    /// Cancels `token` when `url` is fetched. That fetch never completes.
    pub fn cancel_when_fetching(&self, url: &str, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((url.to_string(), token));
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        let cancel = self
            .cancel_on
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(target, _)| target == url)
            .map(|(_, token)| token.clone());
        if let Some(token) = cancel {
            token.cancel();
            return std::future::pending().await;
        }
        if self.failing.contains(url) {
            return Err(Error::Extraction(format!("refused {url}")));
        }
        Ok(url.as_bytes().to_vec())
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Counts progress events by name, e.g. `"chapter_advance"`.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<HashMap<&'static str, usize>>,
}

impl RecordingProgress {
    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().get(event).copied().unwrap_or(0)
    }

    fn record(&self, event: &'static str) {
        *self.events.lock().unwrap().entry(event).or_default() += 1;
    }
}

impl Progress for RecordingProgress {
    fn on_preparation_start(&self, _title: &str, _chapters: usize) {
        self.record("preparation_start");
    }

    fn on_preparation_advance(&self) {
        self.record("preparation_advance");
    }

    fn on_preparation_complete(&self) {
        self.record("preparation_complete");
    }

    fn on_comic_start(&self, _title: &str, _chapters: usize) {
        self.record("comic_start");
    }

    fn on_comic_advance(&self) {
        self.record("comic_advance");
    }

    fn on_comic_complete(&self) {
        self.record("comic_complete");
    }

    fn on_chapter_start(&self, _title: &str, _images: usize) {
        self.record("chapter_start");
    }

    fn on_chapter_advance(&self) {
        self.record("chapter_advance");
    }

    fn on_chapter_complete(&self) {
        self.record("chapter_complete");
    }
}

/// A one-image failure for `chapter`.
pub fn failure(chapter: &Chapter, url: &str, index: usize) -> crate::model::DownloadFailure {
    crate::model::DownloadFailure {
        chapter: chapter.clone(),
        image: ImageInfo::new(url, index),
    }
}
