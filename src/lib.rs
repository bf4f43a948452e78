//! # thesis2pdf
//!
//! Search a university digital-library portal for scanned theses and stitch
//! each thesis's page images into a single PDF.
//!
//! ## Why this crate?
//!
//! The portal only offers theses through an in-browser page-flip viewer —
//! there is no download button. Under the hood the viewer resolves a
//! "read online" link through a chain of redirects into a session-scoped
//! image path and then pulls one JPEG per page. This crate speaks that
//! protocol directly: it harvests search results, walks the redirect chain,
//! fetches every page image in order, and assembles them into a PDF you can
//! actually keep.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SearchQuery
//!  │
//!  ├─ 1. Search    paginated portal query → PaperRecords + totals
//!  │               (per selected record, strictly sequential)
//!  ├─ 2. Resolve   3-hop redirect chain → viewer session → image base path
//!  ├─ 3. Fetch     sequential page images, retry on transient errors,
//!  │               end-of-document detected from the server's 404 body
//!  └─ 4. Assemble  staged JPEGs → one PDF per thesis, staging cleaned up
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thesis2pdf::{download_batch, search_page, DownloadConfig, SearchField, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::default();
//!     let query = SearchQuery::new(SearchField::Topic, "神经网络");
//!
//!     let results = search_page(&query, &config).await?;
//!     println!("{} records ({} total)", results.records.len(), results.total_count);
//!
//!     let outcome = download_batch(&results.records, &config).await?;
//!     println!("{} downloaded, {} skipped, {} failed",
//!         outcome.stats.downloaded,
//!         outcome.stats.skipped,
//!         outcome.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `thesis2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! thesis2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DegreeLevel, DownloadConfig, DownloadConfigBuilder, SearchField, SearchQuery, SortOrder,
    DEFAULT_BASE_URL, DEFAULT_READER_BASE_URL, DEFAULT_USER_AGENT,
};
pub use download::{download_batch, download_paper, search_page, search_range};
pub use error::{PaperError, Thesis2PdfError};
pub use output::{
    BatchOutcome, BatchStats, CountSource, PaperOutcome, PaperRecord, PaperResult, ResultPage,
};
pub use progress::{DownloadProgressCallback, NoopProgressCallback, ProgressCallback};
