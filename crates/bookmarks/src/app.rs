//! Bookmark export run - orchestrates the session-collect-export flow.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{EstablishMode, LoginConfig, SessionEstablisher};
use crate::browser::{BrowserSettings, BrowsingSurface, ChromeSurface};
use crate::cancel::CancelToken;
use crate::enrichment::{LinkResolver, ResolverConfig};
use crate::progress::ProgressObserver;
use crate::storage::{DedupTracker, Exporter, OutputFormat};
use crate::twitter::{
    ArticleConfig, ArticleFetcher, BookmarkRecord, CollectConfig, CollectOutcome, CollectStatus,
    Collector,
};

/// Configuration for one export run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Session file path.
    pub auth_file: PathBuf,
    /// Output path without extension.
    pub output_stem: PathBuf,
    /// Which files to write.
    pub format: OutputFormat,
    /// Log in, store the session and stop.
    pub save_auth_only: bool,
    /// Keys exported by earlier runs, if tracked.
    pub state_file: Option<PathBuf>,
    /// Browser launch settings.
    pub browser: BrowserSettings,
    /// Timeline collection.
    pub collect: CollectConfig,
    /// t.co expansion.
    pub resolver: ResolverConfig,
    /// X Article fetching.
    pub article: ArticleConfig,
    /// Interactive login.
    pub login: LoginConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            auth_file: PathBuf::from("twitter_auth.json"),
            output_stem: PathBuf::from("bookmarks"),
            format: OutputFormat::default(),
            save_auth_only: false,
            state_file: None,
            browser: BrowserSettings::default(),
            collect: CollectConfig::default(),
            resolver: ResolverConfig::default(),
            article: ArticleConfig::default(),
            login: LoginConfig::default(),
        }
    }
}

/// What the browser phase produced.
#[derive(Debug)]
pub enum Acquisition {
    /// Only a session was stored (`--save-auth-only`).
    SessionSaved,
    /// Bookmarks were collected.
    Collected(CollectOutcome),
}

/// Result of a full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Bookmarks collected.
    pub collected: usize,
    /// Why collection stopped, if it ran.
    pub status: Option<CollectStatus>,
    /// Files written.
    pub files: Vec<PathBuf>,
}

/// Export run orchestrator.
pub struct Runner {
    config: RunConfig,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
}

impl Runner {
    /// Create a new runner.
    pub fn new(config: RunConfig, observer: Arc<dyn ProgressObserver>, cancel: CancelToken) -> Self {
        Self {
            config,
            observer,
            cancel,
        }
    }

    /// Launch the browser, collect bookmarks and export them.
    pub async fn run(&self) -> Result<RunSummary> {
        let tracker = match &self.config.state_file {
            Some(path) => Some(DedupTracker::load(path)?),
            None => None,
        };
        let known: Vec<String> = tracker
            .iter()
            .flat_map(|t| t.keys().cloned())
            .collect();
        if !known.is_empty() {
            tracing::info!(count = known.len(), "Skipping bookmarks exported by earlier runs");
        }

        let surface = ChromeSurface::launch(&self.config.browser)
            .await
            .context("failed to launch browser")?;
        let acquired = self.acquire(&surface, known).await;
        if let Err(e) = surface.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }

        match acquired? {
            Acquisition::SessionSaved => {
                tracing::info!("Session saved. Exiting (--save-auth-only).");
                Ok(RunSummary::default())
            }
            Acquisition::Collected(outcome) => self.finish(outcome, tracker).await,
        }
    }

    /// Authenticate `surface` and collect bookmarks from it.
    ///
    /// A failed attempt in headed mode earns one more interactive login and
    /// collection attempt. A timeline that simply had nothing new does not.
    pub async fn acquire(
        &self,
        surface: &dyn BrowsingSurface,
        known: Vec<String>,
    ) -> Result<Acquisition> {
        let headless = self.config.browser.headless;
        let establisher = SessionEstablisher::new(
            self.config.login.clone(),
            self.config.auth_file.clone(),
            self.observer.clone(),
            self.cancel.clone(),
        );

        let mode = if self.config.save_auth_only {
            EstablishMode::ForceLogin
        } else if headless {
            EstablishMode::RequireStored
        } else {
            EstablishMode::PreferStored
        };
        let session = establisher.establish(surface, mode).await?;
        tracing::debug!(?session, "Session established");
        if self.config.save_auth_only {
            return Ok(Acquisition::SessionSaved);
        }

        let articles = ArticleFetcher::new(self.config.article.clone(), self.observer.clone());
        let collector = Collector::new(
            self.config.collect.clone(),
            articles,
            self.observer.clone(),
            self.cancel.clone(),
        )
        .with_known_keys(known);

        let mut outcome = collector.collect(surface).await;
        if outcome.records.is_empty() && is_failed_attempt(outcome.status) {
            if headless {
                if outcome.status == CollectStatus::SessionExpired {
                    bail!("session expired; run without --headless to log in again");
                }
            } else if !self.cancel.is_cancelled() {
                tracing::info!("Scrape failed - attempting interactive login");
                match establisher.login(surface).await {
                    Ok(()) => outcome = collector.collect(surface).await,
                    Err(e) => tracing::warn!(error = %e, "Login retry failed"),
                }
            }
        }

        Ok(Acquisition::Collected(outcome))
    }

    /// Export collected bookmarks and update the state file.
    pub async fn finish(
        &self,
        outcome: CollectOutcome,
        tracker: Option<DedupTracker>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            collected: outcome.records.len(),
            status: Some(outcome.status),
            files: Vec::new(),
        };
        if outcome.records.is_empty() {
            tracing::warn!(status = ?outcome.status, "No bookmarks collected.");
            return Ok(summary);
        }

        summary.files = self.export(&outcome.records).await?;

        if let (Some(mut tracker), Some(path)) = (tracker, &self.config.state_file) {
            let added = tracker.record(&outcome.records);
            tracker.save(path)?;
            tracing::debug!(added, total = tracker.count(), "Updated state file");
        }
        Ok(summary)
    }

    async fn export(&self, records: &[BookmarkRecord]) -> Result<Vec<PathBuf>> {
        let resolver =
            LinkResolver::http(&self.config.resolver).context("failed to build HTTP client")?;
        let exporter = Exporter::new(resolver, self.observer.clone());
        let files = exporter
            .export(records, &self.config.output_stem, self.config.format)
            .await?;
        Ok(files)
    }
}

/// Whether collection stopped because the attempt failed rather than ran out.
fn is_failed_attempt(status: CollectStatus) -> bool {
    matches!(
        status,
        CollectStatus::SessionExpired | CollectStatus::ContentTimeout | CollectStatus::SurfaceFailed
    )
}
