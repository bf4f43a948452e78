//! CLI binary for thesis2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DownloadConfig`/`SearchQuery`, renders the result table, and prints
//! per-paper progress.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thesis2pdf::{
    download_batch, search_range, CountSource, DegreeLevel, DownloadConfig,
    DownloadProgressCallback, PaperRecord, ProgressCallback, SearchField, SearchQuery, SortOrder,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the batch, per-paper log lines
/// printed through the bar, and a live message showing the page currently
/// being fetched (total page count is unknown until the document ends).
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl DownloadProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_papers: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} theses  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_papers as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Downloading");
    }

    fn on_paper_start(&self, index: usize, total_papers: usize, title: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar
            .set_message(format!("[{index}/{total_papers}] {title}"));
    }

    fn on_page_fetched(&self, index: usize, total_papers: usize, page: usize) {
        self.bar
            .set_message(format!("[{index}/{total_papers}] page {page}"));
    }

    fn on_paper_skipped(&self, index: usize, total_papers: usize, title: &str) {
        self.bar.println(format!(
            "  {} [{index}/{total_papers}] {}  {}",
            cyan("↷"),
            title,
            dim("already downloaded"),
        ));
        self.bar.inc(1);
    }

    fn on_paper_complete(&self, index: usize, total_papers: usize, pages: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} [{index}/{total_papers}]  {:<10}  {}",
            green("✓"),
            format!("{pages} pages"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_paper_error(&self, index: usize, total_papers: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        let msg = if error.chars().count() > 80 {
            let truncated: String = error.chars().take(79).collect();
            format!("{truncated}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} [{index}/{total_papers}]  {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_papers: usize, downloaded: usize) {
        let _ = (total_papers, downloaded);
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Search by topic and download everything on result page 1
  thesis2pdf "神经网络"

  # Search by advisor, doctoral theses only, newest first
  thesis2pdf --field advisor --degree doctoral --sort year "张三"

  # Harvest result pages 1-3, download only the 2nd and 5th listed theses
  thesis2pdf --pages 1-3 --select 2,5 "复杂网络"

  # List matches without downloading anything
  thesis2pdf --search-only "控制理论"

  # Machine-readable output, no confirmation prompt
  thesis2pdf --json --yes "博弈论" > outcome.json

SEARCH FIELDS:
  topic, title, keyword, author, department, subject, advisor, year

ENVIRONMENT VARIABLES:
  THESIS2PDF_BASE_URL         Portal root (search pages)
  THESIS2PDF_READER_BASE_URL  Page-image reader root
  THESIS2PDF_OUTPUT_DIR       Output directory for finished PDFs

NOTES:
  A thesis whose PDF already exists in the output directory is skipped
  without any network traffic, so re-running the same search is cheap.
  Page images are staged in a scratch directory that is wiped between
  theses; interrupting a run leaves at most that scratch directory behind.
"#;

/// Download scanned theses from the library portal as PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "thesis2pdf",
    version,
    about = "Search the library portal for scanned theses and download them as PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Search term.
    term: String,

    /// Bibliographic field the term is matched against.
    #[arg(long, value_enum, default_value = "topic")]
    field: FieldArg,

    /// Degree-level filter.
    #[arg(long, value_enum, default_value = "any")]
    degree: DegreeArg,

    /// Result ordering.
    #[arg(long, value_enum, default_value = "title")]
    sort: SortArg,

    /// Result page(s) to harvest: a single page (3) or a range (1-5).
    #[arg(long, default_value = "1")]
    pages: String,

    /// Download only these 1-based entries of the listing (e.g. 1,3,5).
    #[arg(long)]
    select: Option<String>,

    /// Directory for finished PDFs.
    #[arg(short, long, env = "THESIS2PDF_OUTPUT_DIR", default_value = "papers")]
    output_dir: PathBuf,

    /// Scratch directory for page images.
    #[arg(long, default_value = "tmpjpgs")]
    staging_dir: PathBuf,

    /// Portal root for search pages.
    #[arg(long, env = "THESIS2PDF_BASE_URL")]
    base_url: Option<String>,

    /// Root of the page-image reader service.
    #[arg(long, env = "THESIS2PDF_READER_BASE_URL")]
    reader_base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// List matches and exit without downloading.
    #[arg(long)]
    search_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FieldArg {
    Topic,
    Title,
    Keyword,
    Author,
    Department,
    Subject,
    Advisor,
    Year,
}

impl From<FieldArg> for SearchField {
    fn from(v: FieldArg) -> Self {
        match v {
            FieldArg::Topic => SearchField::Topic,
            FieldArg::Title => SearchField::Title,
            FieldArg::Keyword => SearchField::Keyword,
            FieldArg::Author => SearchField::Author,
            FieldArg::Department => SearchField::Department,
            FieldArg::Subject => SearchField::Subject,
            FieldArg::Advisor => SearchField::Advisor,
            FieldArg::Year => SearchField::Year,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DegreeArg {
    Any,
    Doctoral,
    Masters,
}

impl From<DegreeArg> for DegreeLevel {
    fn from(v: DegreeArg) -> Self {
        match v {
            DegreeArg::Any => DegreeLevel::Any,
            DegreeArg::Doctoral => DegreeLevel::Doctoral,
            DegreeArg::Masters => DegreeLevel::Masters,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Title,
    Year,
}

impl From<SortArg> for SortOrder {
    fn from(v: SortArg) -> Self {
        match v {
            SortArg::Title => SortOrder::ByTitle,
            SortArg::Year => SortOrder::ByYearDesc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build query + config ─────────────────────────────────────────────
    let query = SearchQuery {
        field: cli.field.into(),
        term: cli.term.clone(),
        degree: cli.degree.into(),
        sort: cli.sort.into(),
        page: 1,
    };

    let mut builder = DownloadConfig::builder()
        .output_dir(&cli.output_dir)
        .staging_dir(&cli.staging_dir)
        .request_timeout_secs(cli.timeout);
    if let Some(base) = &cli.base_url {
        builder = builder.base_url(base);
    }
    if let Some(reader) = &cli.reader_base_url {
        builder = builder.reader_base_url(reader);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Search ───────────────────────────────────────────────────────────
    let page_range = parse_pages(&cli.pages)
        .with_context(|| format!("Invalid --pages value '{}'", cli.pages))?;

    let results = search_range(&query, page_range, &config)
        .await
        .context("Search failed")?;

    if results.records.is_empty() {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            eprintln!("No matching theses found.");
        }
        return Ok(());
    }

    if !cli.json && !cli.quiet {
        print_listing(&results.records);
        let qualifier = match results.count_source {
            CountSource::Exact | CountSource::Loose => "",
            CountSource::Estimated => "at least ",
        };
        eprintln!(
            "{}",
            dim(&format!(
                "{}{} records total, {} result pages",
                qualifier, results.total_count, results.total_pages
            ))
        );
    }

    if cli.search_only {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        return Ok(());
    }

    // ── Selection + confirmation gate ────────────────────────────────────
    let selected: Vec<PaperRecord> = match &cli.select {
        Some(spec) => {
            let indices = parse_select(spec, results.records.len())
                .with_context(|| format!("Invalid --select value '{spec}'"))?;
            indices
                .into_iter()
                .map(|i| results.records[i - 1].clone())
                .collect()
        }
        None => results.records.clone(),
    };

    if !cli.yes && !confirm(selected.len())? {
        eprintln!("Bye!");
        return Ok(());
    }

    // ── Download ─────────────────────────────────────────────────────────
    // The progress bar is attached only now: its steady tick would redraw
    // over the result listing and the confirmation prompt.
    let config = if show_progress {
        DownloadConfig {
            progress_callback: Some(CliProgressCallback::new_dynamic() as ProgressCallback),
            ..config
        }
    } else {
        config
    };

    let outcome = download_batch(&selected, &config)
        .await
        .context("Download failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if !cli.quiet {
        let s = &outcome.stats;
        if s.failed == 0 {
            eprintln!(
                "{} {} downloaded, {} skipped  {}",
                green("✔"),
                bold(&s.downloaded.to_string()),
                s.skipped,
                dim(&format!("({} pages, {:.1}s)", s.total_pages, s.duration_ms as f64 / 1000.0)),
            );
        } else {
            eprintln!(
                "{} {}/{} downloaded  ({} skipped, {} failed)",
                if s.downloaded == 0 && s.skipped == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&s.downloaded.to_string()),
                s.total_papers,
                s.skipped,
                red(&s.failed.to_string()),
            );
        }
    }

    if outcome.stats.downloaded == 0 && outcome.stats.failed > 0 {
        bail!("every selected thesis failed to download");
    }
    Ok(())
}

/// Render the numbered result listing.
fn print_listing(records: &[PaperRecord]) {
    for (i, r) in records.iter().enumerate() {
        eprintln!(
            "{:>3}. {}  {} {}  {} {}  {} {}",
            i + 1,
            bold(&r.title),
            dim("author"),
            r.author,
            dim("advisor"),
            r.advisor,
            dim("year"),
            r.year,
        );
    }
}

/// "3" → 3..=3, "1-5" → 1..=5.
fn parse_pages(spec: &str) -> Result<RangeInclusive<u64>> {
    let spec = spec.trim();
    if let Some((start, end)) = spec.split_once('-') {
        let start: u64 = start.trim().parse()?;
        let end: u64 = end.trim().parse()?;
        if start == 0 || end < start {
            bail!("page range must be ascending and 1-based");
        }
        Ok(start..=end)
    } else {
        let page: u64 = spec.parse()?;
        if page == 0 {
            bail!("pages are 1-based");
        }
        Ok(page..=page)
    }
}

/// "1,3,5" → sorted, deduplicated 1-based indices, all within `len`.
fn parse_select(spec: &str, len: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for part in spec.split(',') {
        let index: usize = part.trim().parse()?;
        if index == 0 || index > len {
            bail!("selection {index} is out of range (1-{len})");
        }
        indices.push(index);
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// Interactive yes/no gate before any network-heavy work.
fn confirm(count: usize) -> Result<bool> {
    eprint!("Download {count} theses? [Y/n] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}
