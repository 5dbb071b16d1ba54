//! Bookmarks CLI - export Twitter/X bookmarks to CSV/JSONL.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookmarks::app::{RunConfig, Runner};
use bookmarks::browser::BrowserSettings;
use bookmarks::cancel::{CancelLevel, CancelToken};
use bookmarks::progress::TracingObserver;
use bookmarks::storage::{normalize_stem, OutputFormat};
use bookmarks::twitter::CollectConfig;

/// Bookmarks CLI - Scroll-collect your Twitter/X bookmarks in a real browser.
#[derive(Parser)]
#[command(name = "bookmarks")]
#[command(about = "Export Twitter/X bookmarks to CSV/JSONL")]
#[command(version)]
pub struct Cli {
    /// Path to the stored session (cookies) JSON
    #[arg(long, env = "BOOKMARKS_AUTH_FILE", default_value = "twitter_auth.json")]
    auth_file: PathBuf,

    /// Max scroll attempts
    #[arg(long, env = "BOOKMARKS_MAX_SCROLLS", default_value = "100")]
    max_scrolls: usize,

    /// Seconds between scrolls
    #[arg(long, env = "BOOKMARKS_SCROLL_DELAY", default_value = "2.0")]
    scroll_delay: f64,

    /// Output filename stem without extension
    #[arg(long, env = "BOOKMARKS_OUTPUT", default_value = "bookmarks")]
    output: String,

    /// Output format
    #[arg(long, env = "BOOKMARKS_FORMAT", value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Run the browser headlessly (requires a saved session)
    #[arg(long, env = "BOOKMARKS_HEADLESS")]
    headless: bool,

    /// Skip fetching full text of X native Articles
    #[arg(long, env = "BOOKMARKS_NO_ARTICLES")]
    no_articles: bool,

    /// Log in and save the session, then exit without collecting
    #[arg(long, env = "BOOKMARKS_SAVE_AUTH_ONLY")]
    save_auth_only: bool,

    /// Remember exported bookmarks here and skip them on later runs
    #[arg(long, env = "BOOKMARKS_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Chrome/Chromium executable to launch
    #[arg(long, env = "BOOKMARKS_CHROME")]
    chrome: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let pass_delay = Duration::try_from_secs_f64(self.scroll_delay)
            .with_context(|| format!("invalid --scroll-delay {}", self.scroll_delay))?;

        Ok(RunConfig {
            auth_file: self.auth_file.clone(),
            output_stem: normalize_stem(&self.output),
            format: self.format,
            save_auth_only: self.save_auth_only,
            state_file: self.state_file.clone(),
            browser: BrowserSettings {
                headless: self.headless,
                executable: self.chrome.clone(),
                ..BrowserSettings::default()
            },
            collect: CollectConfig {
                max_passes: self.max_scrolls,
                pass_delay,
                fetch_articles: !self.no_articles,
                ..CollectConfig::default()
            },
            ..RunConfig::default()
        })
    }
}

/// Ctrl+C once finishes up, twice exits immediately.
fn spawn_interrupt_listener(cancel: CancelToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match cancel.cancel() {
                CancelLevel::Graceful => tracing::info!(
                    "Interrupted - finishing up with what was collected (Ctrl+C again to force quit)"
                ),
                CancelLevel::Forced => {
                    tracing::warn!("Force quit");
                    std::process::exit(130);
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("bookmarks=debug,info")
        } else {
            EnvFilter::new("bookmarks=info,warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = cli.run_config()?;
    tracing::debug!(
        auth_file = %config.auth_file.display(),
        output = %config.output_stem.display(),
        format = ?config.format,
        max_scrolls = config.collect.max_passes,
        headless = config.browser.headless,
        "Starting bookmark export"
    );

    let cancel = CancelToken::new();
    spawn_interrupt_listener(cancel.clone());

    let runner = Runner::new(config, Arc::new(TracingObserver), cancel);
    let summary = runner.run().await?;

    if let Some(status) = summary.status {
        tracing::info!(
            collected = summary.collected,
            files = summary.files.len(),
            ?status,
            "Done"
        );
    }
    Ok(())
}
