//! Domain types shared by the pipelines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One chapter of a graphic novel as listed on the source site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub url: String,
}

impl Chapter {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// A page image and its 0-based position within the chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub index: usize,
}

impl ImageInfo {
    #[must_use]
    pub fn new(url: impl Into<String>, index: usize) -> Self {
        Self {
            url: url.into(),
            index,
        }
    }
}

/// A chapter whose image URLs have been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedChapter {
    pub chapter: Chapter,
    pub images: Vec<ImageInfo>,
}

impl PreparedChapter {
    /// Builds a prepared chapter, numbering images in extraction order.
    #[must_use]
    pub fn from_links(chapter: Chapter, links: Vec<String>) -> Self {
        let images = links
            .into_iter()
            .enumerate()
            .map(|(index, url)| ImageInfo { url, index })
            .collect();
        Self { chapter, images }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.chapter.title
    }
}

/// How the user wants to pick chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadOption {
    /// Every chapter.
    All,
    /// From a starting chapter to the end.
    Partial,
    /// A closed range of chapters.
    Range,
    /// An arbitrary subset picked by title.
    Selective,
}

impl DownloadOption {
    pub const ALL: [Self; 4] = [Self::All, Self::Partial, Self::Range, Self::Selective];

    /// Short description used by interactive front-ends.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::All => "Download all chapters",
            Self::Partial => "Download from a chapter onwards",
            Self::Range => "Download a range of chapters",
            Self::Selective => "Pick chapters from the list",
        }
    }
}

impl fmt::Display for DownloadOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "All",
            Self::Partial => "Partial",
            Self::Range => "Range",
            Self::Selective => "Selective",
        };
        f.write_str(name)
    }
}

/// An image that failed to download, kept in memory until shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub chapter: Chapter,
    pub image: ImageInfo,
}
