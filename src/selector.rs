//! Chapter selection according to the chosen [`DownloadOption`].

use std::collections::HashSet;

use crate::error::Result;
use crate::model::{Chapter, DownloadOption};
use crate::prompt::Prompt;

/// Returns the chapters to process for `option`, asking `prompt` for details.
///
/// The result always keeps the original relative order. `chapters` must not
/// be empty.
///
/// # Errors
///
/// Propagates prompt errors such as a cancelled prompt.
pub async fn select_chapters(
    chapters: &[Chapter],
    option: DownloadOption,
    prompt: &dyn Prompt,
) -> Result<Vec<Chapter>> {
    debug_assert!(!chapters.is_empty());

    let selected = match option {
        DownloadOption::All => chapters.to_vec(),
        DownloadOption::Partial => {
            let start = ask_start(chapters, prompt).await?;
            chapters[start - 1..].to_vec()
        }
        DownloadOption::Range => {
            let start = ask_start(chapters, prompt).await?;
            let end = ask_end(start, chapters, prompt).await?;
            chapters[start - 1..end].to_vec()
        }
        DownloadOption::Selective => {
            let titles: HashSet<String> =
                prompt.get_chapters_from_list(chapters).await?.into_iter().collect();
            chapters
                .iter()
                .filter(|c| titles.contains(&c.title))
                .cloned()
                .collect()
        }
    };

    log::debug!("{option} selection kept {} of {} chapters", selected.len(), chapters.len());
    Ok(selected)
}

async fn ask_start(chapters: &[Chapter], prompt: &dyn Prompt) -> Result<usize> {
    loop {
        let start = prompt.get_chapters_starting_at(chapters).await?;
        if (1..=chapters.len()).contains(&start) {
            return Ok(start);
        }
        prompt.on_invalid_input(&format!(
            "Starting chapter must be between 1 and {}.",
            chapters.len()
        ));
    }
}

async fn ask_end(start: usize, chapters: &[Chapter], prompt: &dyn Prompt) -> Result<usize> {
    loop {
        let end = prompt.get_chapters_endpoint(start, chapters).await?;
        if (start..=chapters.len()).contains(&end) {
            return Ok(end);
        }
        prompt.on_invalid_input(&format!(
            "Last chapter must be between {start} and {}.",
            chapters.len()
        ));
    }
}
