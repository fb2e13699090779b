//! Progress reporting hooks driven by the pipelines.

/// Receives progress for the three logical bars: preparation, comic, chapter.
///
/// All methods have default no-op implementations.
pub trait Progress: Send + Sync {
    /// Image-link extraction started for `chapters` chapters.
    fn on_preparation_start(&self, _title: &str, _chapters: usize) {}

    /// One chapter's image links were resolved (or failed).
    fn on_preparation_advance(&self) {}

    fn on_preparation_complete(&self) {}

    /// Downloading started for a comic with `chapters` chapters.
    fn on_comic_start(&self, _title: &str, _chapters: usize) {}

    /// One chapter finished downloading.
    fn on_comic_advance(&self) {}

    fn on_comic_complete(&self) {}

    /// A chapter with `images` images started downloading.
    fn on_chapter_start(&self, _title: &str, _images: usize) {}

    /// One image was written or recorded as failed.
    fn on_chapter_advance(&self) {}

    fn on_chapter_complete(&self) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}
