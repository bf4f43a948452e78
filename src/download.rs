//! Top-level entry points: search the portal, download a batch of theses.
//!
//! The per-paper pipeline (resolve → fetch → assemble) is a pure function
//! of `PaperRecord` + `DownloadConfig`: no state survives between papers
//! except the shared HTTP client (connection and cookie reuse) and the
//! output directory. Papers run strictly sequentially in submission order;
//! a paper's failure is caught at the paper boundary, reported through the
//! progress callback, and never aborts the batch.

use crate::config::{DownloadConfig, SearchQuery};
use crate::error::{PaperError, Thesis2PdfError};
use crate::output::{BatchOutcome, BatchStats, PaperOutcome, PaperRecord, PaperResult, ResultPage};
use crate::pipeline::{assemble, fetch, resolve, search};
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run one search and return the parsed result page.
pub async fn search_page(
    query: &SearchQuery,
    config: &DownloadConfig,
) -> Result<ResultPage, Thesis2PdfError> {
    let client = build_client(config)?;
    search::fetch_result_page(&client, query, config).await
}

/// Harvest an inclusive range of result pages, de-duplicated.
pub async fn search_range(
    query: &SearchQuery,
    pages: RangeInclusive<u64>,
    config: &DownloadConfig,
) -> Result<ResultPage, Thesis2PdfError> {
    let client = build_client(config)?;
    search::fetch_result_range(&client, query, pages, config).await
}

/// Download one thesis; convenience wrapper over [`download_batch`].
pub async fn download_paper(
    paper: &PaperRecord,
    config: &DownloadConfig,
) -> Result<PaperOutcome, Thesis2PdfError> {
    let mut outcome = download_batch(std::slice::from_ref(paper), config).await?;
    outcome
        .papers
        .pop()
        .map(|r| r.outcome)
        .ok_or_else(|| Thesis2PdfError::Internal("batch of one returned no result".into()))
}

/// Download every paper in the slice, strictly sequentially.
///
/// Already-downloaded papers (their destination file exists) are skipped
/// without any network traffic. Each paper's staging directory is
/// recreated before its fetch and removed afterwards — on failure paths
/// too — so a broken paper leaves nothing behind to trip the next one.
pub async fn download_batch(
    papers: &[PaperRecord],
    config: &DownloadConfig,
) -> Result<BatchOutcome, Thesis2PdfError> {
    let start = Instant::now();
    let client = build_client(config)?;
    let total = papers.len();

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| Thesis2PdfError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results = Vec::with_capacity(total);
    let mut stats = BatchStats {
        total_papers: total,
        ..BatchStats::default()
    };

    for (i, paper) in papers.iter().enumerate() {
        let index = i + 1;
        let destination = config.output_dir.join(paper.output_filename());

        if destination.exists() {
            info!("[{}/{}] '{}' already downloaded, skipping", index, total, paper.title);
            if let Some(cb) = &config.progress_callback {
                cb.on_paper_skipped(index, total, &paper.title);
            }
            stats.skipped += 1;
            results.push(PaperResult {
                record: paper.clone(),
                outcome: PaperOutcome::Skipped { path: destination },
            });
            continue;
        }

        info!("[{}/{}] Downloading '{}'", index, total, paper.title);
        if let Some(cb) = &config.progress_callback {
            cb.on_paper_start(index, total, &paper.title);
        }

        let outcome = match run_paper(&client, paper, &destination, index, total, config).await {
            Ok(pages) => {
                info!("[{}/{}] Done: {} pages", index, total, pages);
                if let Some(cb) = &config.progress_callback {
                    cb.on_paper_complete(index, total, pages);
                }
                stats.downloaded += 1;
                stats.total_pages += pages;
                PaperOutcome::Downloaded {
                    path: destination,
                    pages,
                }
            }
            Err(error) => {
                warn!("[{}/{}] '{}' failed: {}", index, total, paper.title, error);
                if let Some(cb) = &config.progress_callback {
                    cb.on_paper_error(index, total, &error.to_string());
                }
                stats.failed += 1;
                PaperOutcome::Failed { error }
            }
        };

        // Staging is transient per paper; remove it on every exit path so a
        // failed paper cannot block the next one.
        remove_staging(&config.staging_dir).await;

        results.push(PaperResult {
            record: paper.clone(),
            outcome,
        });
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(total, stats.downloaded);
    }

    Ok(BatchOutcome {
        papers: results,
        stats,
    })
}

/// The resolve → fetch → assemble pipeline for one paper.
async fn run_paper(
    client: &reqwest::Client,
    paper: &PaperRecord,
    destination: &Path,
    index: usize,
    total: usize,
    config: &DownloadConfig,
) -> Result<usize, PaperError> {
    init_staging(&config.staging_dir)
        .await
        .map_err(|e| PaperError::Staging {
            detail: e.to_string(),
        })?;

    let image_base = resolve::resolve_image_base(client, &paper.read_link, config).await?;
    debug!("Image base for '{}': {}", paper.title, image_base);

    let callback = config.progress_callback.clone();
    fetch::fetch_pages(client, &image_base, &config.staging_dir, config, |page| {
        if let Some(cb) = &callback {
            cb.on_page_fetched(index, total, page);
        }
    })
    .await?;

    assemble::assemble_pdf(&config.staging_dir, destination).await
}

/// One client for the whole run: redirects are always handled manually
/// (the viewer protocol requires reading `Location` by hand), cookies
/// carry the viewer session across hops.
fn build_client(config: &DownloadConfig) -> Result<reqwest::Client, Thesis2PdfError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| Thesis2PdfError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Delete-then-recreate the staging directory.
async fn init_staging(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

async fn remove_staging(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove staging dir '{}': {}", dir.display(), e);
        }
    }
}
