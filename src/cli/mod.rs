//! Terminal front-end: argument parsing, interactive prompts and wiring.

mod progress;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console::{Term, style};

use crate::crawl::CrawlerRegistry;
use crate::fetch::HttpImageFetcher;
use crate::network::DnsProbe;
use crate::orchestrator::{Collaborators, Orchestrator, RunReport};
use crate::prompt::{Prompt, parse_selection};
use crate::{AppConfig, Chapter, DownloadOption, Error, Result};

pub use progress::{IndicatifProgress, print_summary};

fn print_usage() {
    eprintln!("Usage: comicrawl [OPTIONS]");
    eprintln!();
    eprintln!("Downloads a comic chapter by chapter. The URL and chapter selection are");
    eprintln!("asked for interactively. Failed images can be retried on the next run.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <FILE>       Configuration file (default: <config dir>/comicrawl/config.toml)");
    eprintln!("  --output <DIR>        Directory receiving the images (default: comics)");
    eprintln!("  --log-file <FILE>     Session log used for retries (default: logs/log.json)");
    eprintln!("  --concurrency <N>     Parallel requests (default: based on system memory)");
    eprintln!("  -h, --help            Show this help");
}

/// Command line options. Anything unset falls back to the configuration.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    log_file: Option<PathBuf>,
    concurrency: Option<usize>,
    help: bool,
}

impl Args {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| Error::Config(format!("{arg} requires a value")))
            };
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "--config" => parsed.config = Some(value()?.into()),
                "--output" => parsed.output = Some(value()?.into()),
                "--log-file" => parsed.log_file = Some(value()?.into()),
                "--concurrency" => {
                    let raw = value()?;
                    let limit = raw
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| Error::Config(format!("invalid concurrency: {raw}")))?;
                    parsed.concurrency = Some(limit);
                }
                _ => return Err(Error::Config(format!("unknown argument: {arg}"))),
            }
        }
        Ok(parsed)
    }

    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(dir) = self.output {
            config = config.with_output_dir(dir);
        }
        if let Some(path) = self.log_file {
            config = config.with_log_file(path);
        }
        if let Some(limit) = self.concurrency {
            config = config.with_max_concurrency(limit);
        }
        config
    }
}

/// Builds the HTTP client used for image downloads.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("comicrawl/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// Parses the CLI, runs one session and prints its summary.
///
/// # Errors
///
/// Returns an error for invalid arguments or configuration. Session
/// failures are reported through the session log instead.
pub async fn run() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        print_usage();
        return Ok(());
    }

    let config = AppConfig::load(args.config.as_deref())?;
    let config = args.apply(config);
    config.validate()?;

    let registry = Arc::new(CrawlerRegistry::with_default_sites());
    let collaborators = Collaborators {
        registry: Arc::clone(&registry),
        prompt: Arc::new(TerminalPrompt::new(registry)),
        progress: Arc::new(IndicatifProgress::new()),
        connectivity: Arc::new(DnsProbe::new(
            config.download.probe_host.clone(),
            config.download.probe_timeout(),
        )),
        fetcher: Arc::new(HttpImageFetcher::new(build_http_client()?)),
    };
    let orchestrator = Orchestrator::new(collaborators, &config);

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("Received SIGINT");
            token.cancel();
        }
    });

    let RunReport { stats, .. } = orchestrator.run().await;
    if let Some(stats) = stats {
        print_summary(&stats);
    }
    Ok(())
}

// =============================================================================
// Terminal prompt
// =============================================================================

/// Asks questions on the terminal. Reads block, so they run off the runtime.
pub struct TerminalPrompt {
    term: Term,
    registry: Arc<CrawlerRegistry>,
}

impl TerminalPrompt {
    #[must_use]
    pub fn new(registry: Arc<CrawlerRegistry>) -> Self {
        Self {
            term: Term::stdout(),
            registry,
        }
    }

    /// Prints `question` and reads one trimmed line. EOF cancels the prompt.
    async fn ask(&self, question: String) -> Result<String> {
        let term = self.term.clone();
        tokio::task::spawn_blocking(move || {
            term.write_str(&format!("{} ", style(question).cyan().bold()))?;
            read_answer(&term)
        })
        .await
        .map_err(|_| Error::PromptCancelled)?
        .map_err(|e| {
            log::debug!("Prompt read failed: {e}");
            Error::PromptCancelled
        })?
        .ok_or(Error::PromptCancelled)
    }

    /// Asks until `parse` accepts the answer.
    async fn ask_until<T>(
        &self,
        question: &str,
        hint: &str,
        parse: impl Fn(&str) -> Option<T> + Send + Sync,
    ) -> Result<T> {
        loop {
            let answer = self.ask(question.to_string()).await?;
            if let Some(value) = parse(&answer) {
                return Ok(value);
            }
            self.on_invalid_input(hint);
        }
    }

    fn say(&self, line: &str) {
        if let Err(e) = self.term.write_line(line) {
            log::debug!("Writing to terminal failed: {e}");
        }
    }
}

fn read_answer(term: &Term) -> io::Result<Option<String>> {
    if term.is_term() {
        return term.read_line().map(|line| Some(line.trim().to_string()));
    }
    let mut line = String::new();
    let read = io::stdin().read_line(&mut line)?;
    Ok((read > 0).then(|| line.trim().to_string()))
}

fn parse_option(input: &str) -> Option<DownloadOption> {
    let choice: usize = input.parse().ok()?;
    DownloadOption::ALL.get(choice.checked_sub(1)?).copied()
}

fn parse_yes_no(input: &str) -> Option<bool> {
    match input.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl Prompt for TerminalPrompt {
    async fn get_url(&self) -> Result<String> {
        loop {
            let url = self.ask("Enter the URL of the comic:".to_string()).await?;
            if self.registry.is_supported(&url) {
                return Ok(url);
            }
            self.on_invalid_input(&format!(
                "Unsupported URL. Supported sites: {}",
                self.registry.supported_domains().join(", ")
            ));
        }
    }

    async fn get_download_option(
        &self,
        title: &str,
        chapter_count: usize,
    ) -> Result<DownloadOption> {
        self.say(&format!("{} has {chapter_count} chapters.", style(title).bold()));
        for (number, option) in DownloadOption::ALL.iter().enumerate() {
            self.say(&format!("  {}. {}", number + 1, option.description()));
        }
        self.ask_until(
            "Choose an option:",
            "Please enter a number between 1 and 4.",
            parse_option,
        )
        .await
    }

    async fn get_chapters_starting_at(&self, chapters: &[Chapter]) -> Result<usize> {
        self.ask_until(
            &format!("Start from chapter (1-{}):", chapters.len()),
            "Please enter a chapter number.",
            |s| s.parse().ok(),
        )
        .await
    }

    async fn get_chapters_endpoint(&self, start: usize, chapters: &[Chapter]) -> Result<usize> {
        self.ask_until(
            &format!("Last chapter ({start}-{}):", chapters.len()),
            "Please enter a chapter number.",
            |s| s.parse().ok(),
        )
        .await
    }

    async fn get_chapters_from_list(&self, chapters: &[Chapter]) -> Result<Vec<String>> {
        for (number, chapter) in chapters.iter().enumerate() {
            self.say(&format!("  {:>4}. {}", number + 1, chapter.title));
        }
        let len = chapters.len();
        let picked = self
            .ask_until(
                "Chapters to download (e.g. 1,3,5-7):",
                &format!("Use numbers between 1 and {len}, separated by commas."),
                |s| parse_selection(s, len),
            )
            .await?;
        Ok(picked
            .into_iter()
            .map(|i| chapters[i].title.clone())
            .collect())
    }

    async fn should_retry_failed_downloads(&self, count: usize, title: &str) -> Result<bool> {
        let noun = if count == 1 { "download" } else { "downloads" };
        self.ask_until(
            &format!("{count} failed {noun} found for {title}. Retry them? (y/n)"),
            "Please answer y or n.",
            parse_yes_no,
        )
        .await
    }

    fn on_invalid_input(&self, message: &str) {
        self.say(&style(message).yellow().to_string());
    }
}
