//! Error types for the thesis2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Thesis2PdfError`] — **Fatal**: the run cannot proceed at all
//!   (bad configuration, unreachable search endpoint, unwritable output
//!   directory). Returned as `Err(Thesis2PdfError)` from the top-level
//!   `search*`/`download*` functions.
//!
//! * [`PaperError`] — **Non-fatal**: one thesis failed (broken redirect
//!   chain, persistent truncated responses, assembly failure) but the rest
//!   of the batch is fine. Stored inside [`crate::output::PaperOutcome`] so
//!   callers see partial success instead of losing the whole batch to one
//!   restricted record.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first failed paper, log and continue, or collect everything for a
//! post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the thesis2pdf library.
///
/// Per-paper failures use [`PaperError`] and are stored in
/// [`crate::output::PaperOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Thesis2PdfError {
    /// The search request itself could not be issued or read.
    #[error("Search request to '{url}' failed: {reason}\nCheck the portal is reachable and the base URL is correct.")]
    SearchFailed { url: String, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write into the output directory.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to a single thesis.
///
/// Stored in [`crate::output::PaperOutcome::Failed`]. The batch continues
/// with the next paper; a single paper's failure never aborts the run.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PaperError {
    /// A hop of the viewer redirect chain carried no `Location` header.
    /// Usually means the thesis is restricted or the read-link has expired.
    #[error("Redirect chain broke at hop {hop}: no Location header (thesis restricted or link expired)")]
    RedirectChain { hop: u8 },

    /// The jump endpoint did not yield a usable image base path.
    #[error("Viewer session bootstrap failed: {detail}")]
    SessionBootstrap { detail: String },

    /// A network request failed outright.
    #[error("Request to '{url}' failed: {detail}")]
    Request { url: String, detail: String },

    /// A page response stayed below the plausible-size threshold after the
    /// configured retry budget.
    #[error("Page {page}: response stayed under the size threshold after {retries} retries")]
    TruncatedPage { page: usize, retries: u32 },

    /// The fetch loop ended before a single page was staged.
    #[error("No pages could be fetched for this thesis")]
    EmptyDocument,

    /// The staging directory could not be reset or written.
    #[error("Staging directory error: {detail}")]
    Staging { detail: String },

    /// Writing a staged page image failed.
    #[error("Failed to stage page {page}: {detail}")]
    PageWrite { page: usize, detail: String },

    /// Building or saving the assembled PDF failed.
    #[error("PDF assembly failed: {detail}")]
    Assembly { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_chain_display_names_hop() {
        let e = PaperError::RedirectChain { hop: 2 };
        assert!(e.to_string().contains("hop 2"), "got: {e}");
    }

    #[test]
    fn truncated_page_display() {
        let e = PaperError::TruncatedPage {
            page: 7,
            retries: 50,
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 7"));
        assert!(msg.contains("50 retries"));
    }

    #[test]
    fn paper_error_round_trips_through_json() {
        let e = PaperError::SessionBootstrap {
            detail: "no query string".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PaperError = serde_json::from_str(&json).unwrap();
        assert!(back.to_string().contains("no query string"));
    }
}
