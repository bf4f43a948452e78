//! Sequential page-image fetching with end-of-document detection.
//!
//! ## The protocol's ugly corner
//!
//! The reader service does not say how many pages a document has. The only
//! end signal is a request for a page past the last one — which comes back
//! as **HTTP 200** wrapping a Tomcat 404 error body. The same error body
//! also appears transiently for pages that do exist, so a single sighting
//! proves nothing: the loop re-asks up to `not_found_retries` times (2 s
//! apart) and only a page that *stays* missing ends the document.
//!
//! Separately, the service sometimes truncates a response mid-transfer
//! (still status 200). Bodies under `min_page_bytes` are re-fetched up to
//! `max_truncation_retries` times; exhausting that budget fails the paper
//! rather than looping forever.

use crate::config::DownloadConfig;
use crate::error::PaperError;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Substring the reader's Tomcat error page carries when a page image does
/// not exist. Matched against the body — the status code is 200.
pub const NOT_FOUND_MARKER: &str = "HTTP状态 404 - 未找到";

/// Fetch page images `1, 2, 3, …` into `staging_dir` until the server
/// signals end-of-document. Returns the number of pages staged.
///
/// Files are written as `{page}.jpg` with no zero padding; the assembler
/// sorts numerically. `on_page` fires after each page is safely on disk.
pub async fn fetch_pages<F>(
    client: &reqwest::Client,
    image_base: &str,
    staging_dir: &Path,
    config: &DownloadConfig,
    mut on_page: F,
) -> Result<usize, PaperError>
where
    F: FnMut(usize),
{
    let mut page: usize = 1;

    loop {
        let url = page_url(image_base, page);
        let mut body = get_bytes(client, &url).await?;

        if is_not_found_body(&body) {
            if confirm_document_end(client, &url, config, &mut body).await? {
                debug!("Page {} stayed missing; document ends at {}", page, page - 1);
                break;
            }
        }

        let mut retries = 0u32;
        while body.len() < config.min_page_bytes {
            retries += 1;
            if retries > config.max_truncation_retries {
                return Err(PaperError::TruncatedPage {
                    page,
                    retries: config.max_truncation_retries,
                });
            }
            warn!(
                "Page {}: {} bytes (< {}), re-fetching (attempt {}/{})",
                page,
                body.len(),
                config.min_page_bytes,
                retries,
                config.max_truncation_retries
            );
            body = get_bytes(client, &url).await?;
        }

        let path = staging_dir.join(format!("{page}.jpg"));
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| PaperError::PageWrite {
                page,
                detail: e.to_string(),
            })?;

        debug!("Staged page {} ({} bytes)", page, body.len());
        on_page(page);
        page += 1;
    }

    let fetched = page - 1;
    if fetched == 0 {
        return Err(PaperError::EmptyDocument);
    }
    Ok(fetched)
}

/// `{base}_{page:05}.jpg` — the reader's fixed image naming scheme.
fn page_url(image_base: &str, page: usize) -> String {
    format!("{image_base}_{page:05}.jpg")
}

/// Re-ask for a 404-body page until it either resolves or stays missing.
///
/// Returns `true` when the page is genuinely absent (document end). On a
/// successful retry, `body` holds the real response for the caller.
async fn confirm_document_end(
    client: &reqwest::Client,
    url: &str,
    config: &DownloadConfig,
    body: &mut Vec<u8>,
) -> Result<bool, PaperError> {
    for attempt in 1..=config.not_found_retries {
        sleep(Duration::from_secs(config.not_found_delay_secs)).await;
        *body = get_bytes(client, url).await?;
        if !is_not_found_body(body) {
            debug!("404 body cleared on retry {attempt} for {url}");
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_not_found_body(body: &[u8]) -> bool {
    String::from_utf8_lossy(body).contains(NOT_FOUND_MARKER)
}

async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, PaperError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PaperError::Request {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

    let bytes = response.bytes().await.map_err(|e| PaperError::Request {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_urls_are_zero_padded_to_five_digits() {
        assert_eq!(
            page_url("http://r.example/read/scans/42", 1),
            "http://r.example/read/scans/42_00001.jpg"
        );
        assert_eq!(
            page_url("http://r.example/read/scans/42", 123),
            "http://r.example/read/scans/42_00123.jpg"
        );
    }

    #[test]
    fn not_found_marker_detected_in_error_body() {
        let body = format!("<html><h1>{NOT_FOUND_MARKER}</h1></html>");
        assert!(is_not_found_body(body.as_bytes()));
        assert!(!is_not_found_body(b"\xff\xd8\xff\xe0 jpeg bytes"));
    }
}
