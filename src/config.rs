//! Configuration types for thesis search and download.
//!
//! All download behaviour is controlled through [`DownloadConfig`], built
//! via its [`DownloadConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across a whole batch run and to diff two runs
//! to understand why their outcomes differ.
//!
//! The search side lives in [`SearchQuery`] plus its three enums, which
//! encode the portal's query-string vocabulary exactly: the portal speaks
//! `choose_key`/`xuewei`/`px` with fixed string values, so the enums exist
//! to keep those wire values out of caller code.

use crate::error::Thesis2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The browser identity sent with every portal request.
///
/// The portal serves an empty result shell to clients without a
/// browser-looking User-Agent, so this is part of the protocol, not
/// cosmetics.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.190 Safari/537.36";

/// Default portal root for search pages.
pub const DEFAULT_BASE_URL: &str = "http://thesis.lib.sjtu.edu.cn";

/// Default root of the page-image reader service (separate port).
pub const DEFAULT_READER_BASE_URL: &str = "http://thesis.lib.sjtu.edu.cn:8443";

// ── Search vocabulary ────────────────────────────────────────────────────

/// Which bibliographic field the free-text term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchField {
    Topic,
    Title,
    Keyword,
    Author,
    Department,
    Subject,
    Advisor,
    Year,
}

impl SearchField {
    /// The portal's `choose_key` query value.
    ///
    /// Note the portal calls the advisor field `teacher`.
    pub fn as_query_value(self) -> &'static str {
        match self {
            SearchField::Topic => "topic",
            SearchField::Title => "title",
            SearchField::Keyword => "keyword",
            SearchField::Author => "author",
            SearchField::Department => "department",
            SearchField::Subject => "subject",
            SearchField::Advisor => "teacher",
            SearchField::Year => "year",
        }
    }
}

/// Degree-level filter (`xuewei`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegreeLevel {
    /// Masters and doctoral theses. (default)
    #[default]
    Any,
    Doctoral,
    Masters,
}

impl DegreeLevel {
    /// The portal's `xuewei` query value.
    pub fn as_query_value(self) -> &'static str {
        match self {
            DegreeLevel::Any => "0",
            DegreeLevel::Doctoral => "1",
            DegreeLevel::Masters => "2",
        }
    }
}

/// Result ordering (`px`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Alphabetical by title. (default)
    #[default]
    ByTitle,
    /// Newest degree year first.
    ByYearDesc,
}

impl SortOrder {
    /// The portal's `px` query value.
    pub fn as_query_value(self) -> &'static str {
        match self {
            SortOrder::ByTitle => "1",
            SortOrder::ByYearDesc => "2",
        }
    }
}

/// One search request: field, term, filters, and the 1-based result page.
///
/// Constructed once per search and never mutated; [`SearchQuery::with_page`]
/// returns a copy aimed at a different result page, which is how multi-page
/// harvesting iterates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub field: SearchField,
    pub term: String,
    pub degree: DegreeLevel,
    pub sort: SortOrder,
    /// 1-based result page number.
    pub page: u64,
}

impl SearchQuery {
    /// A query over `field` for `term`, with default filters, page 1.
    pub fn new(field: SearchField, term: impl Into<String>) -> Self {
        Self {
            field,
            term: term.into(),
            degree: DegreeLevel::default(),
            sort: SortOrder::default(),
            page: 1,
        }
    }

    /// Copy of this query aimed at a different result page.
    pub fn with_page(&self, page: u64) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Render the full search URL against the given portal root.
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/sub.asp?content={}&choose_key={}&xuewei={}&px={}&page={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.term),
            self.field.as_query_value(),
            self.degree.as_query_value(),
            self.sort.as_query_value(),
            self.page,
        )
    }
}

// ── Download configuration ───────────────────────────────────────────────

/// Configuration for a search-and-download run.
///
/// Built via [`DownloadConfig::builder()`] or [`DownloadConfig::default()`].
///
/// # Example
/// ```rust
/// use thesis2pdf::DownloadConfig;
///
/// let config = DownloadConfig::builder()
///     .output_dir("papers")
///     .request_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DownloadConfig {
    /// Portal root for search pages. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Root of the page-image reader service. Default: [`DEFAULT_READER_BASE_URL`].
    ///
    /// The reader runs on a separate port from the search pages, so the two
    /// roots are configured independently.
    pub reader_base_url: String,

    /// User-Agent header sent with every request. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Directory receiving one finished PDF per thesis. Default: `papers`.
    pub output_dir: PathBuf,

    /// Transient per-thesis image staging directory. Default: `tmpjpgs`.
    ///
    /// Deleted and recreated before each thesis's fetch, and removed again
    /// after assembly (or failure), so no state leaks between papers.
    pub staging_dir: PathBuf,

    /// Retries when a page response is the server's 404 error body. Default: 10.
    ///
    /// The portal signals end-of-document with an HTTP 200 carrying a 404
    /// error page, but it also serves that same body transiently under
    /// load. Re-asking a few times separates "document ended" from "server
    /// hiccup"; only after every retry still returns the error body does
    /// the fetch loop conclude the document is complete.
    pub not_found_retries: u32,

    /// Fixed delay between 404-body retries, in seconds. Default: 2.
    pub not_found_delay_secs: u64,

    /// Minimum plausible page-image size in bytes. Default: 2000.
    ///
    /// The portal occasionally returns a truncated body mid-transfer with a
    /// 200 status. Anything under this threshold is treated as transient
    /// and re-fetched. Genuine page scans are never this small.
    pub min_page_bytes: usize,

    /// Retry budget for under-sized responses before the paper is failed.
    /// Default: 50.
    ///
    /// A page that never reaches [`min_page_bytes`](Self::min_page_bytes)
    /// escalates to [`crate::PaperError::TruncatedPage`] once this budget
    /// is exhausted, so one wedged page cannot stall the batch forever.
    pub max_truncation_retries: u32,

    /// Per-request timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Progress event sink. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reader_base_url: DEFAULT_READER_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from("papers"),
            staging_dir: PathBuf::from("tmpjpgs"),
            not_found_retries: 10,
            not_found_delay_secs: 2,
            min_page_bytes: 2000,
            max_truncation_retries: 50,
            request_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("base_url", &self.base_url)
            .field("reader_base_url", &self.reader_base_url)
            .field("output_dir", &self.output_dir)
            .field("staging_dir", &self.staging_dir)
            .field("not_found_retries", &self.not_found_retries)
            .field("not_found_delay_secs", &self.not_found_delay_secs)
            .field("min_page_bytes", &self.min_page_bytes)
            .field("max_truncation_retries", &self.max_truncation_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn reader_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.reader_base_url = url.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn not_found_retries(mut self, n: u32) -> Self {
        self.config.not_found_retries = n;
        self
    }

    pub fn not_found_delay_secs(mut self, secs: u64) -> Self {
        self.config.not_found_delay_secs = secs;
        self
    }

    pub fn min_page_bytes(mut self, bytes: usize) -> Self {
        self.config.min_page_bytes = bytes;
        self
    }

    pub fn max_truncation_retries(mut self, n: u32) -> Self {
        self.config.max_truncation_retries = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DownloadConfig, Thesis2PdfError> {
        let c = &self.config;
        for (name, url) in [("base_url", &c.base_url), ("reader_base_url", &c.reader_base_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Thesis2PdfError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if c.output_dir == c.staging_dir {
            return Err(Thesis2PdfError::InvalidConfig(
                "output_dir and staging_dir must differ (staging is deleted between papers)".into(),
            ));
        }
        Ok(self.config)
    }
}
