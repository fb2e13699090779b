//! Top-level driver for one comicrawl session.
//!
//! The orchestrator initialises the session log, picks the run mode, runs the
//! pipelines and then shuts down exactly once. Shutdown records how the
//! session ended and flushes the failures collected during the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::crawl::CrawlerRegistry;
use crate::download::DownloadPipeline;
use crate::error::{Error, ErrorKind, Result};
use crate::fetch::ImageFetcher;
use crate::format::{OutcomeLevel, outcome_message};
use crate::limiter::ConcurrencyLimiter;
use crate::mode::{Mode, ModeSelector};
use crate::network::Connectivity;
use crate::preparation::PreparationPipeline;
use crate::progress::Progress;
use crate::prompt::Prompt;
use crate::session::{SessionLog, SourceOfTermination};
use crate::stats::DownloadStats;

/// External capabilities the session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<CrawlerRegistry>,
    pub prompt: Arc<dyn Prompt>,
    pub progress: Arc<dyn Progress>,
    pub connectivity: Arc<dyn Connectivity>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub source: SourceOfTermination,
    /// Images that failed during this run.
    pub failed_downloads: usize,
    /// Present when the download stage finished.
    pub stats: Option<DownloadStats>,
}

/// Runs a session and guarantees a single shutdown.
pub struct Orchestrator {
    collaborators: Collaborators,
    session_log: Arc<SessionLog>,
    limiter: ConcurrencyLimiter,
    output_dir: PathBuf,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: &AppConfig) -> Self {
        Self {
            collaborators,
            session_log: Arc::new(SessionLog::new(&config.paths.log_file)),
            limiter: ConcurrencyLimiter::from_override(config.download.max_concurrency),
            output_dir: config.paths.output_dir.clone(),
            cancel: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Token that aborts the session when cancelled, e.g. from a Ctrl-C handler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn session_log(&self) -> &SessionLog {
        &self.session_log
    }

    /// Runs the session to its end. Never fails: errors are classified,
    /// reported and folded into the returned [`RunReport`].
    pub async fn run(&self) -> RunReport {
        log::debug!("Running with concurrency {}", self.limiter.limit());

        let outcome = self.execute().await;
        let source = match &outcome {
            Ok(_) => SourceOfTermination::Program,
            Err(e) => {
                report(e);
                e.termination_source()
            }
        };
        self.shutdown(source);

        RunReport {
            source,
            failed_downloads: self.session_log.failed_download_count(),
            stats: outcome.ok(),
        }
    }

    /// Logs the outcome and dumps the session log.
    ///
    /// Only the first call has any effect; later calls return `false`.
    pub fn shutdown(&self, source: SourceOfTermination) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            log::debug!("Shutdown already done, ignoring {source}");
            return false;
        }

        let (level, message) = outcome_message(source, self.session_log.failed_download_count());
        match level {
            OutcomeLevel::Info | OutcomeLevel::Success => log::info!("{message}"),
            OutcomeLevel::Warn => log::warn!("{message}"),
            OutcomeLevel::Error => log::error!("{message}"),
        }

        if let Err(e) = self.session_log.dump(source) {
            log::error!("{}", e.user_message());
        }
        true
    }

    async fn execute(&self) -> Result<DownloadStats> {
        self.session_log.init()?;

        let selector = ModeSelector::new(&self.session_log, self.collaborators.prompt.as_ref());
        let mode = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            mode = selector.select() => mode,
        }?;

        match mode {
            Mode::Fresh => {
                let prepared = self.preparation().start().await?;
                self.session_log
                    .register_session_info(&prepared.title, &prepared.url)?;
                self.session_log.start_tracking(Vec::new());
                self.download()
                    .start(&prepared.title, &prepared.chapters)
                    .await
            }
            Mode::Retry(plan) => {
                self.session_log.start_tracking(plan.pending());
                self.download().start(&plan.title, &plan.chapters).await
            }
        }
    }

    fn preparation(&self) -> PreparationPipeline {
        let c = &self.collaborators;
        PreparationPipeline::new(
            Arc::clone(&c.registry),
            Arc::clone(&c.prompt),
            Arc::clone(&c.progress),
            Arc::clone(&c.connectivity),
            self.limiter,
        )
        .with_cancellation(self.cancel.clone())
    }

    fn download(&self) -> DownloadPipeline {
        let c = &self.collaborators;
        DownloadPipeline::new(
            Arc::clone(&c.fetcher),
            Arc::clone(&c.connectivity),
            Arc::clone(&self.session_log),
            Arc::clone(&c.progress),
            self.limiter,
            self.output_dir.clone(),
        )
        .with_cancellation(self.cancel.clone())
    }
}

fn report(error: &Error) {
    match (error, error.kind()) {
        (Error::PromptCancelled | Error::Cancelled, _) => log::debug!("{error}"),
        (_, ErrorKind::Ignorable) => log::warn!("{}", error.user_message()),
        (_, ErrorKind::Unexpected) => {
            log::debug!("{error:?}");
            log::error!("{}", error.user_message());
        }
        _ => log::error!("{}", error.user_message()),
    }
}
