//! Progress-callback trait for batch download events.
//!
//! Inject an [`Arc<dyn DownloadProgressCallback>`] via
//! [`crate::config::DownloadConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a batch of theses.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a GUI thread, or a log
//! file without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so a presentation layer may run
//! the whole pipeline on a background worker.
//!
//! All indices are 1-based, matching what a user sees in a result listing.

use std::sync::Arc;

/// Called by the download pipeline as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Papers are processed strictly sequentially, so no
/// two per-paper events ever race; implementations still must be
/// `Send + Sync` because the pipeline may run off the caller's thread.
pub trait DownloadProgressCallback: Send + Sync {
    /// Called once before the first paper is processed.
    fn on_batch_start(&self, total_papers: usize) {
        let _ = total_papers;
    }

    /// Called when a paper's fetch begins.
    fn on_paper_start(&self, index: usize, total_papers: usize, title: &str) {
        let _ = (index, total_papers, title);
    }

    /// Called when a paper is skipped because its PDF already exists.
    fn on_paper_skipped(&self, index: usize, total_papers: usize, title: &str) {
        let _ = (index, total_papers, title);
    }

    /// Called after each page image is staged.
    ///
    /// `page` is the 1-based page just fetched; the total page count is not
    /// known in advance (the fetch loop discovers the end of the document).
    fn on_page_fetched(&self, index: usize, total_papers: usize, page: usize) {
        let _ = (index, total_papers, page);
    }

    /// Called when a paper's PDF has been assembled.
    fn on_paper_complete(&self, index: usize, total_papers: usize, pages: usize) {
        let _ = (index, total_papers, pages);
    }

    /// Called when a paper fails; the batch continues with the next paper.
    fn on_paper_error(&self, index: usize, total_papers: usize, error: &str) {
        let _ = (index, total_papers, error);
    }

    /// Called once after every paper has been attempted.
    fn on_batch_complete(&self, total_papers: usize, downloaded: usize) {
        let _ = (total_papers, downloaded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DownloadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DownloadConfig`].
pub type ProgressCallback = Arc<dyn DownloadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        papers: AtomicUsize,
        pages: AtomicUsize,
        errors: AtomicUsize,
        skips: AtomicUsize,
    }

    impl DownloadProgressCallback for TrackingCallback {
        fn on_paper_start(&self, _index: usize, _total: usize, _title: &str) {
            self.papers.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_fetched(&self, _index: usize, _total: usize, _page: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paper_skipped(&self, _index: usize, _total: usize, _title: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paper_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_paper_start(1, 2, "some thesis");
        cb.on_page_fetched(1, 2, 14);
        cb.on_paper_complete(1, 2, 14);
        cb.on_paper_skipped(2, 2, "another thesis");
        cb.on_paper_error(2, 2, "redirect chain broke");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            papers: AtomicUsize::new(0),
            pages: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            skips: AtomicUsize::new(0),
        };

        tracker.on_paper_start(1, 3, "a");
        tracker.on_page_fetched(1, 3, 1);
        tracker.on_page_fetched(1, 3, 2);
        tracker.on_paper_skipped(2, 3, "b");
        tracker.on_paper_error(3, 3, "boom");

        assert_eq!(tracker.papers.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn DownloadProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_page_fetched(1, 10, 512);
    }
}
