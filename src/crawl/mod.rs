//! Site crawlers and the registry that picks one for a URL.

mod bato;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::Chapter;

pub use bato::BatoCrawler;

/// Extraction capability of a supported site.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn extract_title(&self, url: &str) -> Result<String>;

    /// Chapters in reading order.
    async fn extract_chapters(&self, url: &str) -> Result<Vec<Chapter>>;

    /// Page image URLs of a chapter in reading order.
    async fn extract_image_links(&self, chapter_url: &str) -> Result<Vec<String>>;

    /// Releases scraping resources. Safe to call more than once.
    async fn terminate(&self);
}

/// Builds a crawler for a registered site.
pub type CrawlerFactory = Arc<dyn Fn() -> Result<Box<dyn Crawler>> + Send + Sync>;

struct Site {
    name: &'static str,
    domains: Vec<String>,
    factory: CrawlerFactory,
}

/// Immutable mapping from URL prefixes to crawler factories.
#[derive(Default)]
pub struct CrawlerRegistry {
    sites: Vec<Site>,
}

impl fmt::Debug for CrawlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.sites.iter().map(|s| (s.name, &s.domains)))
            .finish()
    }
}

impl CrawlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every site comicrawl supports out of the box.
    #[must_use]
    pub fn with_default_sites() -> Self {
        Self::new().register(
            "Bato",
            ["https://bato.to", "https://xbato.com"],
            Arc::new(|| BatoCrawler::new().map(|c| Box::new(c) as Box<dyn Crawler>)),
        )
    }

    /// Adds a site handling URLs that start with any of `domains`.
    #[must_use]
    pub fn register<I, S>(mut self, name: &'static str, domains: I, factory: CrawlerFactory) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites.push(Site {
            name,
            domains: domains.into_iter().map(Into::into).collect(),
            factory,
        });
        self
    }

    /// Every supported URL prefix, in registration order.
    #[must_use]
    pub fn supported_domains(&self) -> Vec<&str> {
        self.sites
            .iter()
            .flat_map(|s| s.domains.iter().map(String::as_str))
            .collect()
    }

    #[must_use]
    pub fn is_supported(&self, url: &str) -> bool {
        self.site_for(url).is_some()
    }

    /// Creates the crawler for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedUrl`] if no site matches, or whatever the
    /// site's factory fails with.
    pub fn create(&self, url: &str) -> Result<Box<dyn Crawler>> {
        let site = self
            .site_for(url)
            .ok_or_else(|| Error::UnsupportedUrl(url.to_string()))?;
        log::debug!("Using {} crawler for {url}", site.name);
        (site.factory)()
    }

    fn site_for(&self, url: &str) -> Option<&Site> {
        self.sites
            .iter()
            .find(|s| s.domains.iter().any(|d| url.starts_with(d.as_str())))
    }
}
