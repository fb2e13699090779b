//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.toml";

/// Download and network settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Overrides the memory-based concurrency level when set.
    pub max_concurrency: Option<usize>,
    /// `host:port` resolved to check connectivity.
    pub probe_host: String,
    /// Seconds before a connectivity probe counts as offline.
    pub probe_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            probe_host: "one.one.one.one:443".to_string(),
            probe_timeout_secs: 5,
        }
    }
}

impl DownloadConfig {
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Where images and the session log go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root of `<title>/<chapter>/<N>.png`.
    pub output_dir: PathBuf,
    /// Session log used for retries.
    pub log_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("comics"),
            log_file: PathBuf::from("logs").join("log.json"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download: DownloadConfig,
    pub paths: PathConfig,
}

impl AppConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.log_file = path.into();
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.download.max_concurrency = Some(limit);
        self
    }

    /// `<config dir>/comicrawl/config.toml`, if the platform has a config dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("comicrawl").join(CONFIG_FILE))
    }

    /// Loads `path` when given, else the default file if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit file is missing, or any file
    /// fails to parse or validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero concurrency override.
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrency == Some(0) {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}
