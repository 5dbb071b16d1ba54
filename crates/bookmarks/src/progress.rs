//! Progress reporting.
//!
//! Components report user-facing progress through a [`ProgressObserver`]
//! handed to them at construction instead of logging directly, so callers
//! decide where progress goes.

use std::path::PathBuf;

use crate::twitter::CrawlPhase;

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The collector moved to a new phase.
    Phase(CrawlPhase),
    /// Landed on a login wall instead of bookmarks.
    SessionExpired { location: String },
    /// The timeline rendered; scrolling starts.
    BookmarksLoaded,
    /// No tweets rendered before the content timeout.
    ContentTimeout { location: String },
    /// The browser failed in a way that ends the attempt.
    SurfaceFailed { error: String },
    /// One scroll pass finished.
    PassCompleted {
        pass: usize,
        max_passes: usize,
        new_items: usize,
        total: usize,
    },
    /// Several consecutive passes yielded nothing new.
    Exhausted { stale_passes: usize },
    /// Collection stopped early on request.
    Cancelled { collected: usize },
    /// Starting to fetch X Articles.
    ArticlesFetching { count: usize },
    /// Fetching one X Article.
    ArticleFetching { url: String },
    /// An X Article could not be fetched.
    ArticleFailed { url: String, error: String },
    /// Collection finished.
    CollectionFinished { total: usize },
    /// The user has to log in by hand.
    LoginPrompt,
    /// Still waiting for the user to log in.
    WaitingForLogin { location: Option<String> },
    /// Left the login wall.
    LoginDetected,
    /// Session state written to disk.
    SessionSaved { path: PathBuf },
    /// Session state written after an interrupted login.
    PartialSessionSaved { path: PathBuf },
    /// Session state could not be written.
    SessionSaveFailed { path: PathBuf, error: String },
    /// Starting t.co expansion.
    LinksResolving { count: usize },
    /// t.co expansion finished.
    LinksResolved { resolved: usize, total: usize },
    /// An output file was written.
    FileWritten { path: PathBuf },
}

/// Receives progress events.
pub trait ProgressObserver: Send + Sync {
    /// Handle one event.
    fn notify(&self, event: &ProgressEvent);
}

/// Renders progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Phase(CrawlPhase::Navigating) => {
                tracing::info!("Navigating to bookmarks");
            }
            ProgressEvent::Phase(phase) => tracing::debug!(?phase, "Collector phase"),
            ProgressEvent::BookmarksLoaded => tracing::info!(
                "Bookmarks loaded. Starting scroll collection (Ctrl+C to stop early)"
            ),
            ProgressEvent::SessionExpired { location } => tracing::error!(
                location,
                "Session expired or invalid. Run without --headless to log in again."
            ),
            ProgressEvent::ContentTimeout { location } => {
                tracing::error!(location, "Timed out waiting for tweets");
            }
            ProgressEvent::SurfaceFailed { error } => tracing::error!(
                error,
                "Browser error. Session may be expired, run without --headless to log in again."
            ),
            ProgressEvent::PassCompleted {
                pass,
                max_passes,
                new_items,
                total,
            } => {
                if *new_items > 0 {
                    tracing::info!("Scroll {pass}/{max_passes} - {new_items} new ({total} total)");
                } else {
                    tracing::debug!(pass, max_passes, "Scroll yielded nothing new");
                }
            }
            ProgressEvent::Exhausted { stale_passes } => {
                tracing::info!("No new tweets for {stale_passes} scrolls - done.");
            }
            ProgressEvent::Cancelled { collected } => {
                tracing::info!("Stopping scroll, processing {collected} collected bookmarks");
            }
            ProgressEvent::ArticlesFetching { count } => {
                tracing::info!("Fetching {count} X Article(s)");
            }
            ProgressEvent::ArticleFetching { url } => tracing::info!(url, "Fetching article"),
            ProgressEvent::ArticleFailed { url, error } => {
                tracing::warn!(url, error, "Failed to fetch article");
            }
            ProgressEvent::CollectionFinished { total } => {
                tracing::info!("Finished - collected {total} bookmarks.");
            }
            ProgressEvent::LoginPrompt => {
                tracing::info!("Please log in to X/Twitter in the browser window.");
                tracing::info!("Login is detected automatically, collection continues afterwards.");
            }
            ProgressEvent::WaitingForLogin { location } => tracing::info!(
                current = location.as_deref().unwrap_or("?"),
                "Waiting for login"
            ),
            ProgressEvent::LoginDetected => tracing::info!("Login detected"),
            ProgressEvent::SessionSaved { path } => {
                tracing::info!(path = %path.display(), "Session saved");
            }
            ProgressEvent::PartialSessionSaved { path } => {
                tracing::info!(path = %path.display(), "Partial session saved");
            }
            ProgressEvent::SessionSaveFailed { path, error } => {
                tracing::warn!(path = %path.display(), error, "Failed to save session");
            }
            ProgressEvent::LinksResolving { count } => {
                tracing::info!("Expanding {count} unique t.co links");
            }
            ProgressEvent::LinksResolved { resolved, total } => {
                tracing::info!("Expanded {resolved} / {total} links.");
            }
            ProgressEvent::FileWritten { path } => {
                tracing::info!(path = %path.display(), "Saved");
            }
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {
    fn notify(&self, _event: &ProgressEvent) {}
}
