//! Crawler for bato.to and its mirrors.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;

use super::Crawler;
use crate::error::{Error, Result};
use crate::model::Chapter;

const USER_AGENT: &str = concat!("comicrawl/", env!("CARGO_PKG_VERSION"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h3[^>]*class="[^"]*\bitem-title\b[^"]*"[^>]*>.*?<a[^>]*>(.*?)</a>"#)
        .expect("valid regex")
});

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\s([^>]*)>(.*?)</a>").expect("valid regex"));

static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\s([^>]*)>").expect("valid regex"));

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bclass\s*=\s*"([^"]*)""#).expect("valid regex"));

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*"([^"]*)""#).expect("valid regex"));

static SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*"([^"]*)""#).expect("valid regex"));

static IMG_HTTPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)const\s+imgHttps\s*=\s*(\[.*?\])\s*;").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Scrapes Bato pages over plain HTTP.
#[derive(Debug)]
pub struct BatoCrawler {
    client: reqwest::Client,
    terminated: AtomicBool,
}

impl BatoCrawler {
    /// # Errors
    ///
    /// Returns [`Error::CrawlerInitializationFailed`] if the HTTP client
    /// cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::CrawlerInitializationFailed(e.to_string()))?;
        Ok(Self {
            client,
            terminated: AtomicBool::new(false),
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(Error::Extraction(format!("crawler terminated before {url}")));
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Crawler for BatoCrawler {
    async fn extract_title(&self, url: &str) -> Result<String> {
        let html = self.fetch_html(url).await?;
        Ok(parse_title(&html))
    }

    async fn extract_chapters(&self, url: &str) -> Result<Vec<Chapter>> {
        let html = self.fetch_html(url).await?;
        parse_chapters(&html, url)
    }

    async fn extract_image_links(&self, chapter_url: &str) -> Result<Vec<String>> {
        let html = self.fetch_html(chapter_url).await?;
        parse_image_links(&html, chapter_url)
    }

    async fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            log::debug!("Bato crawler terminated");
        }
    }
}

fn parse_title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .map(|c| text_content(&c[1]))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// The site lists newest first; the result is in reading order.
fn parse_chapters(html: &str, base: &str) -> Result<Vec<Chapter>> {
    let mut chapters = ANCHOR_RE
        .captures_iter(html)
        .filter(|c| has_class(&c[1], "chapt"))
        .filter_map(|c| {
            let href = HREF_RE.captures(&c[1])?;
            Some((href[1].to_string(), text_content(&c[2])))
        })
        .map(|(href, title)| resolve(base, &href).map(|url| Chapter::new(title, url)))
        .collect::<Result<Vec<_>>>()?;
    chapters.reverse();
    Ok(chapters)
}

fn parse_image_links(html: &str, base: &str) -> Result<Vec<String>> {
    let links: Vec<String> = IMG_RE
        .captures_iter(html)
        .filter(|c| has_class(&c[1], "page-img"))
        .filter_map(|c| SRC_RE.captures(&c[1]).map(|s| s[1].to_string()))
        .map(|src| resolve(base, &src))
        .collect::<Result<_>>()?;
    if !links.is_empty() {
        return Ok(links);
    }

    // Reader pages render images from a script array
    match IMG_HTTPS_RE.captures(html) {
        Some(c) => Ok(serde_json::from_str(&c[1])?),
        None => Ok(Vec::new()),
    }
}

fn has_class(attrs: &str, class: &str) -> bool {
    CLASS_RE
        .captures(attrs)
        .is_some_and(|c| c[1].split_whitespace().any(|name| name == class))
}

fn resolve(base: &str, href: &str) -> Result<String> {
    let base = Url::parse(base).map_err(|e| Error::Extraction(format!("{base}: {e}")))?;
    base.join(&decode_entities(href))
        .map(String::from)
        .map_err(|e| Error::Extraction(format!("{href}: {e}")))
}

fn text_content(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    decode_entities(stripped.split_whitespace().collect::<Vec<_>>().join(" ").as_str())
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
