//! Error types for comicrawl and their classification.

use thiserror::Error;

use crate::session::SourceOfTermination;

/// Errors that can occur while preparing or downloading a graphic novel.
#[derive(Error, Debug)]
pub enum Error {
    /// The source page lists no chapters.
    #[error("{title} is empty. Aborting.")]
    EmptyGraphicNovel {
        /// Title of the empty graphic novel.
        title: String,
    },

    /// The scraping backend could not be brought up.
    #[error("Failed to initialize crawler. Please try again.")]
    CrawlerInitializationFailed(String),

    /// The session log could not be created.
    #[error("Failed to create log file. Run comicrawl again with elevated privileges.")]
    LogFileCreationFailed,

    /// The session log was expected on disk but is gone.
    #[error("Could not find log file.")]
    LogFileMissing,

    /// The session log is unreadable or structurally invalid.
    #[error("Log file corrupted. Delete 'log.json' and try again.")]
    LogFileCorrupted,

    /// Network connectivity was lost while working.
    #[error("Network connection lost.")]
    ConnectionInterrupted,

    /// The user aborted an interactive prompt.
    #[error("Prompt cancelled by user.")]
    PromptCancelled,

    /// The run was cancelled through the cancellation token.
    #[error("Operation cancelled.")]
    Cancelled,

    /// No registered crawler handles the URL.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// A page did not contain what the crawler was looking for.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for comicrawl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected interruption by the user (cancelled prompt, Ctrl-C, no browser).
    Ignorable,
    /// A known failure with a message meant for the user.
    Application,
    /// Log file subsystem fault.
    LogFile,
    /// Anything else.
    Unexpected,
}

const UNEXPECTED_MESSAGE: &str = "Something unexpected happened.";

impl Error {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PromptCancelled | Self::Cancelled | Self::CrawlerInitializationFailed(_) => {
                ErrorKind::Ignorable
            }
            Self::LogFileCreationFailed | Self::LogFileMissing | Self::LogFileCorrupted => {
                ErrorKind::LogFile
            }
            Self::EmptyGraphicNovel { .. }
            | Self::ConnectionInterrupted
            | Self::UnsupportedUrl(_)
            | Self::Config(_) => ErrorKind::Application,
            Self::Extraction(_) | Self::Io(_) | Self::Http(_) | Self::Json(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    /// Returns `true` for failures that end the session as user-initiated.
    #[must_use]
    pub const fn is_ignorable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Ignorable)
    }

    /// Maps the error to the recorded cause of termination.
    #[must_use]
    pub const fn termination_source(&self) -> SourceOfTermination {
        if self.is_ignorable() {
            SourceOfTermination::User
        } else {
            SourceOfTermination::Error
        }
    }

    /// Message shown to the user. Unexpected errors get a generic line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unexpected => UNEXPECTED_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }
}
