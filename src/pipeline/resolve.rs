//! Redirect resolution: read-link → session-scoped image base path.
//!
//! The portal's "read online" link does not point at anything fetchable.
//! It resolves through exactly three server-issued redirects — each one
//! stamping session state into cookies — before landing on a viewer URL
//! whose query string carries the session token. That query string, replayed
//! against the JSON "jump" endpoint, names the storage path of the first
//! page image; everything before the first `_` in that path is the base all
//! other page URLs are built from.
//!
//! Redirect-following stays disabled on the client so each `Location`
//! header can be read manually: a hop without one means the thesis is
//! restricted (or the link expired) and only this paper fails.

use crate::config::DownloadConfig;
use crate::error::PaperError;
use serde::Deserialize;
use tracing::debug;

/// Number of server-issued hops between the read-link and the viewer URL.
const REDIRECT_HOPS: u8 = 3;

/// The jump endpoint's JSON body: a list of page images, first page first.
#[derive(Debug, Deserialize)]
struct JumpResponse {
    list: Vec<JumpEntry>,
}

#[derive(Debug, Deserialize)]
struct JumpEntry {
    src: String,
}

/// Resolve a paper's read-link to the base URL its page images hang off.
///
/// Returns a prefix like `http://…:8443/read/scans/42`; page `i` lives at
/// `{base}_{i:05}.jpg`.
pub async fn resolve_image_base(
    client: &reqwest::Client,
    read_link: &str,
    config: &DownloadConfig,
) -> Result<String, PaperError> {
    let mut url = read_link.to_string();

    for hop in 1..=REDIRECT_HOPS {
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| PaperError::Request {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(PaperError::RedirectChain { hop })?;

        debug!("Redirect hop {}: {}", hop, location);
        url = location.to_string();
    }

    let session_query = query_string(&url).ok_or_else(|| PaperError::SessionBootstrap {
        detail: format!("final redirect target carries no query string: {url}"),
    })?;

    let jump_url = format!(
        "{}/read/jumpServlet?page=1&{}",
        config.reader_base_url.trim_end_matches('/'),
        session_query
    );
    debug!("Bootstrapping viewer session: {}", jump_url);

    let response = client
        .get(&jump_url)
        .send()
        .await
        .map_err(|e| PaperError::Request {
            url: jump_url.clone(),
            detail: e.to_string(),
        })?;

    let jump: JumpResponse = response
        .json()
        .await
        .map_err(|e| PaperError::SessionBootstrap {
            detail: format!("jump endpoint returned invalid JSON: {e}"),
        })?;

    let first = jump.list.first().ok_or_else(|| PaperError::SessionBootstrap {
        detail: "jump endpoint listed no page images".into(),
    })?;

    Ok(format!(
        "{}/read/{}",
        config.reader_base_url.trim_end_matches('/'),
        image_stem(&first.src)
    ))
}

/// Everything after the first `?`.
fn query_string(url: &str) -> Option<&str> {
    url.split_once('?').map(|(_, q)| q)
}

/// Everything before the first `_` — the per-document storage prefix shared
/// by all page images.
fn image_stem(src: &str) -> &str {
    src.split_once('_').map(|(stem, _)| stem).unwrap_or(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_splits_on_first_question_mark() {
        assert_eq!(
            query_string("http://x/viewer?tk=a&f=b?c"),
            Some("tk=a&f=b?c")
        );
        assert_eq!(query_string("http://x/viewer"), None);
    }

    #[test]
    fn image_stem_truncates_at_first_underscore() {
        assert_eq!(image_stem("scans/42_00001.jpg"), "scans/42");
        assert_eq!(image_stem("plain.jpg"), "plain.jpg");
        assert_eq!(image_stem("a_b_c"), "a");
    }

    #[test]
    fn jump_response_parses_portal_shape() {
        let json = r#"{"list":[{"src":"scans/42_00001.jpg"},{"src":"scans/42_00002.jpg"}]}"#;
        let jump: JumpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(jump.list.len(), 2);
        assert_eq!(image_stem(&jump.list[0].src), "scans/42");
    }
}
