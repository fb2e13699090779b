//! Session log persistence for retry support.
//!
//! The log is a single JSON document describing the comic of the last run,
//! the images that failed, and how the run ended. A later run reads it to
//! decide whether to offer a retry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Chapter, DownloadFailure, ImageInfo, PreparedChapter};

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOfTermination {
    /// The user cancelled (Ctrl-C, aborted prompt).
    User,
    /// A fatal error stopped the run.
    Error,
    /// The program ran to completion.
    Program,
}

impl fmt::Display for SourceOfTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "User",
            Self::Error => "Error",
            Self::Program => "Program",
        };
        f.write_str(name)
    }
}

/// Identity of the comic the session worked on. Empty strings mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Failed images of one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChapter {
    pub title: String,
    pub images: Vec<ImageInfo>,
}

/// Failed downloads grouped by chapter title.
///
/// Serialized as a JSON object keyed by chapter title. Chapter order is the
/// order in which failures were first seen, and it survives a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedDownloads(Vec<FailedChapter>);

impl FailedDownloads {
    /// Groups failures by chapter title, keeping first-seen order.
    #[must_use]
    pub fn group(failures: &[DownloadFailure]) -> Self {
        let mut grouped: Vec<FailedChapter> = Vec::new();
        for failure in failures {
            let image = failure.image.clone();
            if let Some(entry) = grouped
                .iter_mut()
                .find(|c| c.title == failure.chapter.title)
            {
                entry.images.push(image);
            } else {
                grouped.push(FailedChapter {
                    title: failure.chapter.title.clone(),
                    images: vec![image],
                });
            }
        }
        Self(grouped)
    }

    #[must_use]
    pub fn chapters(&self) -> &[FailedChapter] {
        &self.0
    }

    /// Total number of failed images across all chapters.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.0.iter().map(|c| c.images.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_count() == 0
    }

    /// Rebuilds downloadable chapters. The chapter URL is unknown and left empty.
    #[must_use]
    pub fn to_prepared(&self) -> Vec<PreparedChapter> {
        self.0
            .iter()
            .map(|c| PreparedChapter {
                chapter: Chapter::new(c.title.clone(), String::new()),
                images: c.images.clone(),
            })
            .collect()
    }
}

impl Serialize for FailedDownloads {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for chapter in &self.0 {
            map.serialize_entry(&chapter.title, &chapter.images)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FailedDownloads {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FailedDownloadsVisitor;

        impl<'de> Visitor<'de> for FailedDownloadsVisitor {
            type Value = FailedDownloads;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of chapter titles to failed images")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut chapters = Vec::new();
                while let Some((title, images)) = access.next_entry::<String, Vec<ImageInfo>>()? {
                    chapters.push(FailedChapter { title, images });
                }
                Ok(FailedDownloads(chapters))
            }
        }

        deserializer.deserialize_map(FailedDownloadsVisitor)
    }
}

/// The persisted session document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLogContent {
    pub comic: ComicInfo,
    pub created_at: DateTime<Utc>,
    pub failed_downloads: FailedDownloads,
    pub source_of_termination: SourceOfTermination,
}

impl SessionLogContent {
    /// Content written when the log file is first created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            comic: ComicInfo::default(),
            created_at: Utc::now(),
            failed_downloads: FailedDownloads::default(),
            source_of_termination: SourceOfTermination::Program,
        }
    }
}

impl Default for SessionLogContent {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the on-disk session log plus this run's in-memory failures.
///
/// Failures are tracked from the moment the download stage starts. Until
/// then a [`dump`](Self::dump) leaves the persisted failures untouched, so a
/// run that ends early does not erase what a previous run recorded.
#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    failures: Mutex<Option<Vec<DownloadFailure>>>,
}

impl SessionLog {
    /// Creates a handle for the log at `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            failures: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the log with default content unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileCreationFailed`] if the file cannot be written.
    pub fn init(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write(&SessionLogContent::new()).map_err(|e| {
            log::debug!("Creating {} failed: {e}", self.path.display());
            Error::LogFileCreationFailed
        })?;
        log::debug!("Created session log at {}", self.path.display());
        Ok(())
    }

    /// Records the comic being downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileMissing`] if the log does not exist.
    pub fn register_session_info(&self, title: &str, url: &str) -> Result<()> {
        self.update(|content| {
            content.comic = ComicInfo {
                title: title.to_string(),
                url: url.to_string(),
            };
        })
    }

    /// Starts this run's failure record.
    ///
    /// `pending` holds images that count as failed until they are downloaded,
    /// e.g. the images of a retry. From now on [`dump`](Self::dump) replaces
    /// the persisted failures.
    pub fn start_tracking(&self, pending: Vec<DownloadFailure>) {
        *self.lock() = Some(pending);
    }

    /// Remembers a failed image. Not persisted until [`dump`](Self::dump).
    ///
    /// Starts tracking if needed. An image already recorded is kept once.
    pub fn register_failed_download(&self, failure: DownloadFailure) {
        let mut failures = self.lock();
        let failures = failures.get_or_insert_with(Vec::new);
        let known = failures
            .iter()
            .any(|f| f.chapter.title == failure.chapter.title && f.image == failure.image);
        if !known {
            failures.push(failure);
        }
    }

    /// Forgets a recorded failure once its image has been downloaded.
    pub fn resolve_failed_download(&self, chapter_title: &str, image: &ImageInfo) {
        if let Some(failures) = self.lock().as_mut() {
            failures.retain(|f| f.chapter.title != chapter_title || f.image != *image);
        }
    }

    /// Snapshot of the failures registered so far.
    #[must_use]
    pub fn failed_downloads(&self) -> Vec<DownloadFailure> {
        self.lock().clone().unwrap_or_default()
    }

    #[must_use]
    pub fn failed_download_count(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }

    /// Persists the termination cause and, if tracking started, this run's
    /// failures.
    ///
    /// Callers must invoke this at most once per process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileMissing`] if the log does not exist, or
    /// [`Error::LogFileCorrupted`] if it cannot be parsed.
    pub fn dump(&self, source: SourceOfTermination) -> Result<()> {
        let grouped = self.lock().as_deref().map(FailedDownloads::group);
        self.update(|content| {
            if let Some(grouped) = grouped {
                content.failed_downloads = grouped;
            }
            content.source_of_termination = source;
        })
    }

    /// Reads and validates the persisted content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileCorrupted`] if the file is unreadable, not
    /// JSON, or structurally invalid.
    pub fn read(&self) -> Result<SessionLogContent> {
        let value = self.read_value()?;
        if !Self::is_valid(&value) {
            return Err(Error::LogFileCorrupted);
        }
        serde_json::from_value(value).map_err(|e| {
            log::debug!("Session log does not match the expected schema: {e}");
            Error::LogFileCorrupted
        })
    }

    /// Reads the raw JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileCorrupted`] if the file is unreadable or not JSON.
    pub fn read_value(&self) -> Result<Value> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            log::debug!("Reading {} failed: {e}", self.path.display());
            Error::LogFileCorrupted
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            log::debug!("Parsing {} failed: {e}", self.path.display());
            Error::LogFileCorrupted
        })
    }

    /// Structural check on a raw session document.
    #[must_use]
    pub fn is_valid(content: &Value) -> bool {
        let comic = &content["comic"];
        comic["title"].is_string()
            && comic["url"].is_string()
            && content["createdAt"].is_string()
            && content["failedDownloads"].is_object()
            && content["sourceOfTermination"].is_string()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<DownloadFailure>>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut SessionLogContent)) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::LogFileMissing);
        }
        let mut content = self.read()?;
        apply(&mut content);
        self.write(&content).map_err(|e| {
            log::debug!("Writing {} failed: {e}", self.path.display());
            Error::LogFileMissing
        })
    }

    /// Writes atomically (write tmp + rename).
    fn write(&self, content: &SessionLogContent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn failure(chapter: &str, url: &str, index: usize) -> DownloadFailure {
        DownloadFailure {
            chapter: Chapter::new(chapter, format!("/{chapter}")),
            image: ImageInfo::new(url, index),
        }
    }

    fn log_in(dir: &TempDir) -> SessionLog {
        SessionLog::new(dir.path().join("logs").join("log.json"))
    }

    #[test]
    fn init_creates_valid_default_log() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();

        let value = log.read_value().unwrap();
        assert!(SessionLog::is_valid(&value));
        let content = log.read().unwrap();
        assert!(content.failed_downloads.is_empty());
        assert_eq!(content.source_of_termination, SourceOfTermination::Program);
        assert_eq!(content.comic, ComicInfo::default());
    }

    #[test]
    fn init_keeps_existing_log() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_session_info("Comic", "https://bato.to/series/1").unwrap();
        let created = log.read().unwrap().created_at;

        log.init().unwrap();
        let content = log.read().unwrap();
        assert_eq!(content.created_at, created);
        assert_eq!(content.comic.title, "Comic");
    }

    #[test]
    fn init_fails_when_directory_is_unwritable() {
        let dir = TempDir::new().unwrap();
        // A regular file where the logs directory should be
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let log = SessionLog::new(blocker.join("log.json"));
        assert!(matches!(log.init(), Err(Error::LogFileCreationFailed)));
    }

    #[test]
    fn register_session_info_requires_file() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        assert!(matches!(
            log.register_session_info("Comic", "url"),
            Err(Error::LogFileMissing)
        ));
    }

    #[test]
    fn register_session_info_merges_comic() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_session_info("Comic 1", "example.com/comic-1").unwrap();

        let content = log.read().unwrap();
        assert_eq!(content.comic.title, "Comic 1");
        assert_eq!(content.comic.url, "example.com/comic-1");
        assert_eq!(content.source_of_termination, SourceOfTermination::Program);
    }

    #[test]
    fn failures_stay_in_memory_until_dump() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_failed_download(failure("Chapter 1", "example.com/chapter-1/20", 20));

        assert_eq!(log.failed_download_count(), 1);
        assert!(log.read().unwrap().failed_downloads.is_empty());
    }

    #[test]
    fn dump_groups_by_chapter_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_session_info("Comic 1", "example.com/comic-1").unwrap();
        log.register_failed_download(failure("Chapter 1", "/img1", 1));
        log.register_failed_download(failure("Chapter 2", "/img1", 1));
        log.register_failed_download(failure("Chapter 1", "/img10", 10));

        log.dump(SourceOfTermination::Program).unwrap();

        let value = log.read_value().unwrap();
        assert!(SessionLog::is_valid(&value));
        assert_eq!(
            value["failedDownloads"],
            json!({
                "Chapter 1": [{ "url": "/img1", "index": 1 }, { "url": "/img10", "index": 10 }],
                "Chapter 2": [{ "url": "/img1", "index": 1 }],
            })
        );

        let content = log.read().unwrap();
        let titles: Vec<_> = content
            .failed_downloads
            .chapters()
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, ["Chapter 1", "Chapter 2"]);
        assert_eq!(content.failed_downloads.image_count(), 3);
        assert_eq!(content.comic.title, "Comic 1");
    }

    #[test]
    fn dump_records_source_and_clears_old_failures() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_failed_download(failure("Chapter 1", "/img1", 0));
        log.dump(SourceOfTermination::Error).unwrap();

        // A later run that downloads without failures overwrites the record
        let next_run = log_in(&dir);
        next_run.start_tracking(Vec::new());
        next_run.dump(SourceOfTermination::User).unwrap();

        let content = next_run.read().unwrap();
        assert!(content.failed_downloads.is_empty());
        assert_eq!(content.source_of_termination, SourceOfTermination::User);
    }

    #[test]
    fn dump_before_tracking_keeps_previous_failures() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.register_failed_download(failure("Chapter 1", "/img1", 0));
        log.dump(SourceOfTermination::Error).unwrap();

        let next_run = log_in(&dir);
        next_run.dump(SourceOfTermination::User).unwrap();

        let content = next_run.read().unwrap();
        assert_eq!(content.failed_downloads.image_count(), 1);
        assert_eq!(content.source_of_termination, SourceOfTermination::User);
    }

    #[test]
    fn pending_failures_are_resolved_by_downloads() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.init().unwrap();
        log.start_tracking(vec![
            failure("Chapter 2", "u1", 0),
            failure("Chapter 3", "u2", 1),
        ]);

        log.resolve_failed_download("Chapter 2", &ImageInfo::new("u1", 0));
        // Failing again does not duplicate the pending entry
        log.register_failed_download(failure("Chapter 3", "u2", 1));
        log.dump(SourceOfTermination::Error).unwrap();

        assert_eq!(log.failed_downloads(), vec![failure("Chapter 3", "u2", 1)]);
        let content = log.read().unwrap();
        assert_eq!(content.failed_downloads.chapters().len(), 1);
        assert_eq!(content.failed_downloads.chapters()[0].title, "Chapter 3");
    }

    #[test]
    fn dump_without_log_is_missing() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        assert!(matches!(
            log.dump(SourceOfTermination::Program),
            Err(Error::LogFileMissing)
        ));
    }

    #[test]
    fn read_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
        std::fs::write(log.path(), "{ not json").unwrap();
        assert!(matches!(log.read(), Err(Error::LogFileCorrupted)));
    }

    #[test]
    fn read_rejects_structurally_invalid_content() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
        std::fs::write(log.path(), r#"{ "comic": {}, "failedDownloads": [] }"#).unwrap();
        assert!(matches!(log.read(), Err(Error::LogFileCorrupted)));
    }

    #[test]
    fn is_valid_checks_every_field() {
        let valid = json!({
            "comic": { "title": "", "url": "" },
            "createdAt": "1970-01-01T00:00:00.123Z",
            "failedDownloads": {},
            "sourceOfTermination": "Program",
        });
        assert!(SessionLog::is_valid(&valid));

        for (pointer, replacement) in [
            ("/comic/title", Value::Null),
            ("/comic/url", json!(1)),
            ("/createdAt", json!(123)),
            ("/failedDownloads", json!([])),
            ("/sourceOfTermination", Value::Null),
        ] {
            let mut broken = valid.clone();
            *broken.pointer_mut(pointer).unwrap() = replacement;
            assert!(!SessionLog::is_valid(&broken), "{pointer} should invalidate");
        }

        assert!(!SessionLog::is_valid(&json!([])));
        assert!(!SessionLog::is_valid(&json!("log")));
    }

    #[test]
    fn to_prepared_rebuilds_chapters_without_urls() {
        let failed = FailedDownloads::group(&[
            failure("Chapter 2", "u1", 0),
            failure("Chapter 3", "u2", 1),
        ]);
        let prepared = failed.to_prepared();

        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].title(), "Chapter 2");
        assert_eq!(prepared[0].chapter.url, "");
        assert_eq!(prepared[0].images, vec![ImageInfo::new("u1", 0)]);
        assert_eq!(prepared[1].images, vec![ImageInfo::new("u2", 1)]);
    }

    #[test]
    fn created_at_serializes_as_string() {
        let value = serde_json::to_value(SessionLogContent::new()).unwrap();
        assert!(value["createdAt"].is_string());
        assert_eq!(value["sourceOfTermination"], "Program");
    }
}
