//! Data model: parsed records, search results, and batch outcomes.

use crate::config::DegreeLevel;
use crate::error::PaperError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One thesis as parsed from a search-result row.
///
/// Immutable once parsed. Two records are the *same thesis* when their
/// `(year, title, author, advisor)` tuples match — the read-link is
/// session-scoped and may differ between harvests of the same record, so it
/// is excluded from [`dedup_key`](Self::dedup_key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub author: String,
    pub advisor: String,
    pub year: String,
    /// Absolute "read online" URL; start of the redirect chain.
    pub read_link: String,
    pub degree: DegreeLevel,
}

impl PaperRecord {
    /// De-duplication identity: `(year, title, author, advisor)`.
    pub fn dedup_key(&self) -> (&str, &str, &str, &str) {
        (&self.year, &self.title, &self.author, &self.advisor)
    }

    /// The finished document's filename: `{year}_{title}_{author}_{advisor}.pdf`.
    ///
    /// Components are sanitised so a title containing a path separator can
    /// never escape the output directory.
    pub fn output_filename(&self) -> String {
        format!(
            "{}_{}_{}_{}.pdf",
            sanitize_component(&self.year),
            sanitize_component(&self.title),
            sanitize_component(&self.author),
            sanitize_component(&self.advisor),
        )
    }
}

/// Replace path separators and other filesystem-hostile characters.
fn sanitize_component(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// How the total-record count of a [`ResultPage`] was derived.
///
/// Counts come from free-form page text, so extraction is best-effort and
/// callers deciding whether to harvest further pages need to know how much
/// to trust the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountSource {
    /// Primary "，共 N 条记录" pattern matched.
    Exact,
    /// Only the looser "共 N 条" pattern matched.
    Loose,
    /// Neither pattern matched; counts are inferred from the parsed rows
    /// (total = rows on this page, pages = the requested page number).
    Estimated,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPage {
    pub records: Vec<PaperRecord>,
    pub total_count: u64,
    /// `ceil(total_count / 20)` when the count was extracted; see
    /// [`CountSource`] for the degraded cases.
    pub total_pages: u64,
    pub count_source: CountSource,
}

impl ResultPage {
    /// An empty page with estimated-zero counts (e.g. the portal answered
    /// with an unexpected redirect).
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_count: 0,
            total_pages: 0,
            count_source: CountSource::Estimated,
        }
    }
}

/// What happened to one paper in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaperOutcome {
    /// PDF assembled at `path` from `pages` page images.
    Downloaded { path: PathBuf, pages: usize },
    /// A PDF with this paper's filename already existed; nothing re-fetched.
    Skipped { path: PathBuf },
    /// The paper failed; the batch continued.
    Failed { error: PaperError },
}

impl PaperOutcome {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, PaperOutcome::Downloaded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PaperOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PaperOutcome::Failed { .. })
    }
}

/// One paper's record paired with its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperResult {
    pub record: PaperRecord,
    pub outcome: PaperOutcome,
}

/// Aggregate statistics for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_papers: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Page images fetched across all downloaded papers.
    pub total_pages: usize,
    pub duration_ms: u64,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub papers: Vec<PaperResult>,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> PaperRecord {
        PaperRecord {
            title: title.into(),
            author: "张三".into(),
            advisor: "李四".into(),
            year: "2019".into(),
            read_link: "http://portal.example/reader.asp?id=1".into(),
            degree: DegreeLevel::Masters,
        }
    }

    #[test]
    fn output_filename_joins_components() {
        let r = record("图神经网络研究");
        assert_eq!(r.output_filename(), "2019_图神经网络研究_张三_李四.pdf");
    }

    #[test]
    fn output_filename_never_contains_separators() {
        let mut r = record("a/b\\c");
        r.author = "x:y".into();
        let name = r.output_filename();
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert_eq!(name, "2019_a_b_c_x_y.pdf");
    }

    #[test]
    fn dedup_key_ignores_read_link() {
        let a = record("t");
        let mut b = record("t");
        b.read_link = "http://portal.example/reader.asp?id=999".into();
        assert_ne!(a, b);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
