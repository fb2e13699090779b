//! comicrawl - A library for downloading graphic novels chapter by chapter.
//!
//! A session either crawls a comic (title, chapter list, selection, image
//! links) and downloads it, or replays the images a previous session failed
//! to fetch. Failures are recorded in a JSON session log so the next run can
//! offer a retry.
//!
//! The core is independent of any terminal: prompts, progress reporting,
//! connectivity checks and image fetching are traits wired in through
//! [`Collaborators`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use comicrawl::{
//!     AppConfig, Collaborators, CrawlerRegistry, DnsProbe, HttpImageFetcher, NoProgress,
//!     Orchestrator, Prompt,
//! };
//!
//! # async fn example(prompt: Arc<dyn Prompt>) {
//! let config = AppConfig::default();
//! let collaborators = Collaborators {
//!     registry: Arc::new(CrawlerRegistry::with_default_sites()),
//!     prompt,
//!     progress: Arc::new(NoProgress),
//!     connectivity: Arc::new(DnsProbe::new(
//!         config.download.probe_host.clone(),
//!         config.download.probe_timeout(),
//!     )),
//!     fetcher: Arc::new(HttpImageFetcher::new(reqwest::Client::new())),
//! };
//!
//! let report = Orchestrator::new(collaborators, &config).run().await;
//! println!("Session ended: {}", report.source);
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod crawl;
pub mod download;
pub mod error;
pub mod fetch;
pub mod format;
pub mod fs;
pub mod limiter;
pub mod mode;
pub mod model;
pub mod network;
pub mod orchestrator;
pub mod preparation;
pub mod progress;
pub mod prompt;
pub mod selector;
pub mod session;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod test_helpers;

// Re-export main types for convenience
pub use config::{AppConfig, DownloadConfig, PathConfig};
pub use crawl::{BatoCrawler, Crawler, CrawlerFactory, CrawlerRegistry};
pub use download::DownloadPipeline;
pub use error::{Error, ErrorKind, Result};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use format::{format_bytes, format_duration, sanitize};
pub use fs::{FileSystem, TokioFileSystem};
pub use limiter::ConcurrencyLimiter;
pub use mode::{Mode, ModeSelector, RetryPlan};
pub use model::{Chapter, DownloadFailure, DownloadOption, ImageInfo, PreparedChapter};
pub use network::{Connectivity, DnsProbe};
pub use orchestrator::{Collaborators, Orchestrator, RunReport};
pub use preparation::{Prepared, PreparationPipeline};
pub use progress::{NoProgress, Progress};
pub use prompt::Prompt;
pub use selector::select_chapters;
pub use session::{SessionLog, SessionLogContent, SourceOfTermination};
pub use stats::DownloadStats;
