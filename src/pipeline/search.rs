//! Metadata harvesting: one GET per result page, parsed into records.
//!
//! ## Why redirects are disabled here
//!
//! The search endpoint answers a plain results page; a 3xx response means
//! the portal bounced the query (session quirk, maintenance redirect) and
//! there is nothing to parse. Following it would only land on an
//! unstructured landing page, so an unexpected redirect is treated as an
//! empty result rather than an error.
//!
//! ## Why rows are skipped silently
//!
//! Confidential records render with missing columns (no author div, no
//! read-link anchor). The portal mixes them freely into result pages, so a
//! row that fails structural extraction is logged at debug level and
//! dropped; the rest of the page still parses.

use crate::config::{DownloadConfig, SearchQuery};
use crate::error::Thesis2PdfError;
use crate::output::{CountSource, PaperRecord, ResultPage};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// The portal lists 20 records per result page.
pub const RECORDS_PER_PAGE: u64 = 20;

/// Primary pattern: "，共 N 条记录" in the result-summary text.
static EXACT_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"，共\s*(\d+)\s*条记录").unwrap());

/// Looser fallback: "共 N 条" anywhere in the page text.
static LOOSE_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"共\s*(\d+)\s*条").unwrap());

/// Rows of the results table. The first matching row is the column header.
static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body section table tr").unwrap());

static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Fetch and parse one page of search results.
///
/// Network failure is fatal (the whole search cannot proceed); a
/// well-formed response that yields no rows is a normal empty result.
pub async fn fetch_result_page(
    client: &reqwest::Client,
    query: &SearchQuery,
    config: &DownloadConfig,
) -> Result<ResultPage, Thesis2PdfError> {
    let url = query.to_url(&config.base_url);
    debug!("Fetching result page: {}", url);

    let response =
        client
            .get(&url)
            .send()
            .await
            .map_err(|e| Thesis2PdfError::SearchFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

    if response.status().is_redirection() {
        warn!(
            "Search page {} answered with a redirect ({}); treating as empty",
            query.page,
            response.status()
        );
        return Ok(ResultPage::empty());
    }

    let body = response
        .text()
        .await
        .map_err(|e| Thesis2PdfError::SearchFailed {
            url,
            reason: e.to_string(),
        })?;

    Ok(parse_result_page(&body, query, &config.base_url))
}

/// Fetch an inclusive range of result pages sequentially, de-duplicating
/// records by `(year, title, author, advisor)`.
///
/// Counts are taken from the first page whose extraction succeeded; an
/// [`CountSource::Estimated`] count is upgraded if a later page yields a
/// real one.
pub async fn fetch_result_range(
    client: &reqwest::Client,
    query: &SearchQuery,
    pages: RangeInclusive<u64>,
    config: &DownloadConfig,
) -> Result<ResultPage, Thesis2PdfError> {
    let mut combined = ResultPage::empty();
    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    let mut first = true;

    for page in pages {
        let result = fetch_result_page(client, &query.with_page(page), config).await?;

        if first || (combined.count_source == CountSource::Estimated
            && result.count_source != CountSource::Estimated)
        {
            combined.total_count = result.total_count;
            combined.total_pages = result.total_pages;
            combined.count_source = result.count_source;
            first = false;
        }

        for record in result.records {
            let (y, t, a, m) = record.dedup_key();
            if seen.insert((y.to_owned(), t.to_owned(), a.to_owned(), m.to_owned())) {
                combined.records.push(record);
            }
        }
    }

    Ok(combined)
}

/// Parse one result page's HTML into records and counts.
pub fn parse_result_page(html: &str, query: &SearchQuery, base_url: &str) -> ResultPage {
    let document = Html::parse_document(html);

    let records: Vec<PaperRecord> = document
        .select(&ROW_SELECTOR)
        .skip(1) // header row
        .take(RECORDS_PER_PAGE as usize)
        .filter_map(|row| {
            let record = extract_record(row, query, base_url);
            if record.is_none() {
                debug!("Skipping result row without required columns (restricted record?)");
            }
            record
        })
        .collect();

    let (total_count, total_pages, count_source) =
        extract_counts(&document, records.len() as u64, query.page);

    debug!(
        "Parsed {} records from page {} (total_count={}, source={:?})",
        records.len(),
        query.page,
        total_count,
        count_source
    );

    ResultPage {
        records,
        total_count,
        total_pages,
        count_source,
    }
}

/// Extract one record from a table row.
///
/// Column layout (1-based, as rendered by the portal): 2 = title,
/// 3 = author, 6 = advisor, 8 = year, 9 = actions cell whose *second*
/// anchor is the read-link. Any missing piece makes the row unusable.
fn extract_record(row: ElementRef<'_>, query: &SearchQuery, base_url: &str) -> Option<PaperRecord> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SELECTOR).collect();

    let title = cell_text(cells.get(1)?)?;
    let author = cell_text(cells.get(2)?)?;
    let advisor = cell_text(cells.get(5)?)?;
    let year = cell_text(cells.get(7)?)?;
    let href = cells
        .get(8)?
        .select(&ANCHOR_SELECTOR)
        .nth(1)?
        .value()
        .attr("href")?;

    Some(PaperRecord {
        title,
        author,
        advisor,
        year,
        read_link: absolutize(base_url, href),
        degree: query.degree,
    })
}

/// Whitespace-trimmed text content of a cell; empty counts as missing.
fn cell_text(cell: &ElementRef<'_>) -> Option<String> {
    let text = cell.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Make a result-row href absolute against the portal root.
fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// Derive `(total_count, total_pages, source)` from the page text.
///
/// Fallback ladder: exact pattern → loose pattern → estimate from the rows
/// actually parsed (degraded but non-fatal: the caller at least learns the
/// requested page exists).
fn extract_counts(document: &Html, parsed_records: u64, requested_page: u64) -> (u64, u64, CountSource) {
    let text: String = document.root_element().text().collect();

    if let Some(n) = first_capture(&EXACT_COUNT_RE, &text) {
        return (n, n.div_ceil(RECORDS_PER_PAGE), CountSource::Exact);
    }
    if let Some(n) = first_capture(&LOOSE_COUNT_RE, &text) {
        return (n, n.div_ceil(RECORDS_PER_PAGE), CountSource::Loose);
    }
    if parsed_records > 0 {
        return (parsed_records, requested_page, CountSource::Estimated);
    }
    (0, 0, CountSource::Estimated)
}

fn first_capture(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchField;

    /// A result page in the portal's structural shape: header row, then one
    /// `<tr>` per record with title/author/advisor/year in the expected
    /// columns and the read-link as the second anchor of the ninth cell.
    fn portal_page(rows: &str, summary: &str) -> String {
        format!(
            r#"<html><body><section><div>
              <div>nav</div><div>filters</div>
              <div><div>crumbs</div><div>
                <p>{summary}</p>
                <table>
                  <tr><td>#</td><td>题名</td><td>作者</td><td>院系</td><td>专业</td><td>导师</td><td>学位</td><td>年份</td><td>操作</td></tr>
                  {rows}
                </table>
              </div></div>
            </div></section></body></html>"#
        )
    }

    fn full_row(n: u32) -> String {
        format!(
            r#"<tr><td>{n}</td><td>论文{n}</td><td><div>作者{n}</div></td><td><div>系</div></td>
               <td><div>专业</div></td><td><div>导师{n}</div></td><td><div>硕士</div></td>
               <td><div>201{n}</div></td>
               <td><div><a href="abs.asp?id={n}">摘要</a><a href="reader.asp?id={n}">阅读</a></div></td></tr>"#
        )
    }

    /// Restricted record: no author, no read-link anchor.
    fn restricted_row() -> String {
        r#"<tr><td>9</td><td>保密论文</td><td></td><td></td><td></td><td></td><td></td>
           <td></td><td><div><a href="abs.asp?id=9">摘要</a></div></td></tr>"#
            .to_string()
    }

    fn query() -> SearchQuery {
        SearchQuery::new(SearchField::Topic, "测试")
    }

    #[test]
    fn full_rows_yield_one_record_each() {
        let html = portal_page(&format!("{}{}", full_row(1), full_row(2)), "");
        let page = parse_result_page(&html, &query(), "http://portal.example");

        assert_eq!(page.records.len(), 2);
        let r = &page.records[0];
        assert_eq!(r.title, "论文1");
        assert_eq!(r.author, "作者1");
        assert_eq!(r.advisor, "导师1");
        assert_eq!(r.year, "2011");
        assert_eq!(r.read_link, "http://portal.example/reader.asp?id=1");
    }

    #[test]
    fn deficient_rows_are_skipped_not_fatal() {
        let html = portal_page(&format!("{}{}", restricted_row(), full_row(3)), "");
        let page = parse_result_page(&html, &query(), "http://portal.example");

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].title, "论文3");
    }

    #[test]
    fn exact_count_pattern_drives_page_maths() {
        let html = portal_page(&full_row(1), "检索结果，共 45 条记录");
        let page = parse_result_page(&html, &query(), "http://portal.example");

        assert_eq!(page.total_count, 45);
        assert_eq!(page.total_pages, 3); // ceil(45 / 20)
        assert_eq!(page.count_source, CountSource::Exact);
    }

    #[test]
    fn exact_boundary_is_not_rounded_up() {
        let html = portal_page(&full_row(1), "，共 40 条记录");
        let page = parse_result_page(&html, &query(), "http://portal.example");
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn loose_pattern_is_the_fallback() {
        let html = portal_page(&full_row(1), "共 7 条");
        let page = parse_result_page(&html, &query(), "http://portal.example");

        assert_eq!(page.total_count, 7);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.count_source, CountSource::Loose);
    }

    #[test]
    fn estimate_falls_back_to_parsed_rows_and_requested_page() {
        let html = portal_page(&format!("{}{}", full_row(1), full_row(2)), "no summary here");
        let q = query().with_page(4);
        let page = parse_result_page(&html, &q, "http://portal.example");

        assert_eq!(page.total_count, 2);
        assert_eq!(page.total_pages, 4);
        assert_eq!(page.count_source, CountSource::Estimated);
    }

    #[test]
    fn empty_page_estimates_zero() {
        let html = portal_page("", "");
        let page = parse_result_page(&html, &query(), "http://portal.example");

        assert!(page.records.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn absolute_hrefs_pass_through() {
        assert_eq!(
            absolutize("http://portal.example", "http://other.example/x"),
            "http://other.example/x"
        );
        assert_eq!(
            absolutize("http://portal.example/", "reader.asp?id=1"),
            "http://portal.example/reader.asp?id=1"
        );
    }
}
