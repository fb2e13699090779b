//! Progress bars and summary reporting for the terminal.

use std::sync::{Mutex, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::progress::Progress;
use crate::{DownloadStats, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

fn make_bar(len: usize, prefix: &'static str, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10.cyan.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar.set_prefix(prefix);
    bar.set_message(message.to_string());
    bar
}

/// Drives three stacked bars: preparation, comic and current chapter.
#[derive(Debug, Default)]
pub struct IndicatifProgress {
    multi: MultiProgress,
    preparation: Mutex<Option<ProgressBar>>,
    comic: Mutex<Option<ProgressBar>>,
    chapter: Mutex<Option<ProgressBar>>,
}

impl IndicatifProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, slot: &Mutex<Option<ProgressBar>>, bar: ProgressBar) {
        let bar = self.multi.add(bar);
        if let Some(old) = slot.lock().unwrap_or_else(PoisonError::into_inner).replace(bar) {
            old.finish_and_clear();
        }
    }

    fn advance(slot: &Mutex<Option<ProgressBar>>) {
        if let Some(bar) = slot.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            bar.inc(1);
        }
    }

    fn finish(slot: &Mutex<Option<ProgressBar>>) {
        if let Some(bar) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
            bar.finish_and_clear();
        }
    }
}

impl Progress for IndicatifProgress {
    fn on_preparation_start(&self, title: &str, chapters: usize) {
        self.start(&self.preparation, make_bar(chapters, "Preparing", title));
    }

    fn on_preparation_advance(&self) {
        Self::advance(&self.preparation);
    }

    fn on_preparation_complete(&self) {
        Self::finish(&self.preparation);
    }

    fn on_comic_start(&self, title: &str, chapters: usize) {
        self.start(&self.comic, make_bar(chapters, "Comic", title));
    }

    fn on_comic_advance(&self) {
        Self::advance(&self.comic);
    }

    fn on_comic_complete(&self) {
        Self::finish(&self.comic);
    }

    fn on_chapter_start(&self, title: &str, images: usize) {
        self.start(&self.chapter, make_bar(images, "Chapter", title));
    }

    fn on_chapter_advance(&self) {
        Self::advance(&self.chapter);
    }

    fn on_chapter_complete(&self) {
        Self::finish(&self.chapter);
    }
}

/// Prints a summary of download statistics.
pub fn print_summary(stats: &DownloadStats) {
    if stats.images_downloaded == 0 && stats.images_failed == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  Chapters:          {}", stats.chapters);
    println!("  Images saved:      {}", stats.images_downloaded);
    if stats.images_failed > 0 {
        println!("  Images failed:     {}", stats.images_failed);
    }
    println!("  Total size:        {}", format_bytes(stats.total_bytes));
    println!("  Total time:        {}", format_duration(stats.elapsed));
    println!(
        "  Average speed:     {}/s",
        format_bytes(stats.average_speed())
    );
    println!("{SEPARATOR}");
}
