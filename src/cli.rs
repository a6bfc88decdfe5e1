//! CLI parsing and orchestration glue. Parses args, launches the browser
//! session, runs the export, and maps errors to exit codes.

use crate::browser::{BrowserConfig, ChromeSession};
use crate::config;
use crate::export::{
    export_book, parse_ignore_spec, AssetClient, ExportError, ExportOptions, IgnoreSet,
    DEFAULT_CHAPTER_DELAY,
};
use crate::formats::ExportMode;
use crate::model::ExportSummary;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Export(#[from] ExportError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Export(
                ExportError::WriteChapter { .. } | ExportError::CreateDir { .. },
            ) => 3,
            CliRunError::Export(_) => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "qqbook")]
#[command(about = "Export a QQ Reader book to per-chapter Markdown or text files")]
#[command(
    after_help = "Config file keys (output_dir, browser_path, user_data_dir, headless, viewport_width, viewport_height, user_agent, chapter_delay_ms, asset_timeout_secs, retry_count, retry_backoff_secs) are documented in the README. CLI flags override config."
)]
pub struct Args {
    /// Numeric book id from the book-detail URL.
    pub book_id: u64,

    /// Chapters to skip: a single id, a comma-separated list (1,2,3), or an
    /// inclusive range (3-5).
    #[arg(short, long, default_value = "", value_parser = parse_ignore_spec)]
    pub ignore: IgnoreSet,

    /// Output directory. Default: output/{book_id}.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export format: markdown or text.
    #[arg(long, default_value = "markdown", value_parser = parse_mode)]
    pub format: ExportMode,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,

    /// Browser executable path (overrides config).
    #[arg(long)]
    pub browser_path: Option<PathBuf>,

    /// Run the browser headless (requires an already logged-in profile).
    #[arg(long)]
    pub headless: bool,

    /// User-Agent for image downloads (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between chapter page loads in milliseconds (overrides config; default 500).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Image request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,
}

fn parse_mode(s: &str) -> Result<ExportMode, String> {
    match s.to_lowercase().as_str() {
        "markdown" | "md" => Ok(ExportMode::Markdown),
        "text" | "txt" => Ok(ExportMode::Text),
        _ => Err(format!(
            "Invalid --format value: '{}'. Use markdown or text.",
            s
        )),
    }
}

fn report_summary(summary: &ExportSummary) {
    eprintln!(
        "Done: {} written, {} skipped (paid), {} skipped (ignored), {} failed.",
        summary.written.len(),
        summary.skipped_paid,
        summary.skipped_ignored,
        summary.failed
    );
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and
/// message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    let output_dir: PathBuf = match &args.output {
        Some(p) => p.clone(),
        None => {
            let base = config
                .as_ref()
                .and_then(|c| c.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("output"));
            base.join(args.book_id.to_string())
        }
    };

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.asset_timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let chapter_delay = args
        .delay_ms
        .or_else(|| config.as_ref().and_then(|c| c.chapter_delay_ms))
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_CHAPTER_DELAY);

    let mut asset_builder = AssetClient::builder().timeout_secs(timeout_secs);
    if let Some(ua) = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()))
    {
        asset_builder = asset_builder.user_agent(ua);
    }
    if let Some(n) = config.as_ref().and_then(|c| c.retry_count) {
        asset_builder = asset_builder.retry_count(n);
    }
    if let Some(backoff) = config.as_ref().and_then(|c| c.retry_backoff_secs.clone()) {
        asset_builder = asset_builder.retry_backoff_secs(backoff);
    }
    let assets = asset_builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let defaults = BrowserConfig::default();
    let browser_config = BrowserConfig {
        executable: args
            .browser_path
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.browser_path.clone())),
        user_data_dir: config
            .as_ref()
            .and_then(|c| c.user_data_dir.clone())
            .unwrap_or(defaults.user_data_dir),
        headless: args.headless
            || config
                .as_ref()
                .and_then(|c| c.headless)
                .unwrap_or(defaults.headless),
        window_size: (
            config
                .as_ref()
                .and_then(|c| c.viewport_width)
                .unwrap_or(defaults.window_size.0),
            config
                .as_ref()
                .and_then(|c| c.viewport_height)
                .unwrap_or(defaults.window_size.1),
        ),
    };

    let mut session = ChromeSession::launch(&browser_config)?;
    session.ensure_logged_in(args.book_id)?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Chapter {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let options = ExportOptions {
        ignore: &args.ignore,
        mode: args.format,
        output_dir: &output_dir,
        progress,
        chapter_delay,
    };
    let summary = export_book(&mut session, &assets, args.book_id, &options)?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    if !args.quiet {
        report_summary(&summary);
    }
    Ok(())
}
