//! Scroll-driven bookmark collector.
//!
//! Navigates to the bookmarks timeline and repeatedly scrolls it, parsing
//! every rendered tweet and keeping the ones not seen before. Collection
//! stops when the pass budget runs out, when several passes in a row
//! produce nothing new, or when cancellation is requested. Failures never
//! propagate: the outcome always carries whatever was collected plus a
//! status describing why collection stopped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::browser::{BrowsingSurface, SurfaceError};
use crate::cancel::CancelToken;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::site;

use super::article::ArticleFetcher;
use super::parser::BookmarkParser;
use super::types::BookmarkRecord;

/// Configuration for bookmark collection.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Max scroll passes.
    pub max_passes: usize,
    /// Pause after each scroll.
    pub pass_delay: Duration,
    /// Fetch the full text of X Articles after scrolling.
    pub fetch_articles: bool,
    /// Consecutive passes without new tweets before giving up.
    pub stale_pass_limit: usize,
    /// How long to wait for the first tweet to render.
    pub content_timeout: Duration,
    /// Pause after navigating, before inspecting the page.
    pub render_pause: Duration,
    /// Pause between article fetches.
    pub article_pacing: Duration,
    /// Scroll distance in viewport heights.
    pub scroll_viewports: f64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_passes: 100,
            pass_delay: Duration::from_secs(2),
            fetch_articles: true,
            stale_pass_limit: 5,
            content_timeout: Duration::from_secs(30),
            render_pause: Duration::from_secs(2),
            article_pacing: Duration::from_secs(1),
            scroll_viewports: 2.0,
        }
    }
}

/// Where the collector currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlPhase {
    /// Loading the bookmarks timeline.
    #[default]
    Navigating,
    /// Waiting for the first tweet to render.
    WaitingForContent,
    /// Scrolling the timeline.
    Scrolling,
    /// Parsing rendered tweets.
    Extracting,
    /// Reading X Articles.
    ArticleFetch,
    /// Finished normally.
    Done,
    /// Stopped on request.
    Aborted,
    /// Bounced to a login wall.
    SessionExpired,
}

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStatus {
    /// Pass budget used up.
    Completed,
    /// Timeline stopped producing new tweets.
    Exhausted,
    /// Cancellation was requested.
    Cancelled,
    /// Redirected to a login wall; nothing collected.
    SessionExpired,
    /// No tweet rendered in time; nothing collected.
    ContentTimeout,
    /// The browser failed before collection started; nothing collected.
    SurfaceFailed,
}

/// Result of one collection attempt.
#[derive(Debug)]
pub struct CollectOutcome {
    /// Collected bookmarks, in timeline order.
    pub records: Vec<BookmarkRecord>,
    /// Why collection stopped.
    pub status: CollectStatus,
    /// Scroll passes performed.
    pub passes: usize,
    /// Phase the collector stopped in.
    pub phase: CrawlPhase,
}

/// Mutable state of one collection run.
#[derive(Debug, Default)]
struct CrawlSession {
    records: Vec<BookmarkRecord>,
    seen: HashSet<String>,
    stale_passes: usize,
    passes: usize,
    phase: CrawlPhase,
}

impl CrawlSession {
    fn new(seen: HashSet<String>) -> Self {
        Self {
            seen,
            ..Self::default()
        }
    }

    /// Append a record unless its key was seen. Keyless records always go in.
    fn absorb(&mut self, record: BookmarkRecord) -> bool {
        if let Some(key) = record.dedup_key() {
            if !self.seen.insert(key) {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    fn finish_pass(&mut self, new_items: usize) {
        self.passes += 1;
        if new_items > 0 {
            self.stale_passes = 0;
        } else {
            self.stale_passes += 1;
        }
    }

    fn finish(self, status: CollectStatus) -> CollectOutcome {
        CollectOutcome {
            records: self.records,
            status,
            passes: self.passes,
            phase: self.phase,
        }
    }
}

/// Collects bookmarks by scrolling the timeline.
pub struct Collector {
    config: CollectConfig,
    articles: ArticleFetcher,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
    known: HashSet<String>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(
        config: CollectConfig,
        articles: ArticleFetcher,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            articles,
            observer,
            cancel,
            known: HashSet::new(),
        }
    }

    /// Treat these dedup keys as already collected (e.g. by an earlier run).
    #[must_use]
    pub fn with_known_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.known.extend(keys);
        self
    }

    /// Run one collection attempt against an authenticated surface.
    pub async fn collect(&self, surface: &dyn BrowsingSurface) -> CollectOutcome {
        let mut session = CrawlSession::new(self.known.clone());

        self.enter(&mut session, CrawlPhase::Navigating);
        if let Err(e) = surface.navigate(site::BOOKMARKS_URL).await {
            tracing::debug!(error = %e, "Navigation to bookmarks failed");
            let location = self.location(surface).await;
            if site::is_login_wall(&location) {
                return self.expire(session, location);
            }
            return self.surface_failed(session, &e);
        }
        tokio::time::sleep(self.config.render_pause).await;

        let location = self.location(surface).await;
        if site::is_login_wall(&location) {
            return self.expire(session, location);
        }

        self.enter(&mut session, CrawlPhase::WaitingForContent);
        match surface
            .wait_for_selector(site::FEED_ITEM_SELECTOR, self.config.content_timeout)
            .await
        {
            Ok(()) => {}
            Err(SurfaceError::Timeout { .. }) => {
                let location = self.location(surface).await;
                if site::is_login_wall(&location) {
                    return self.expire(session, location);
                }
                self.observer
                    .notify(&ProgressEvent::ContentTimeout { location });
                return session.finish(CollectStatus::ContentTimeout);
            }
            Err(e) => return self.surface_failed(session, &e),
        }

        let status = self.scroll(surface, &mut session).await;

        if self.config.fetch_articles && status != CollectStatus::Cancelled {
            self.fetch_articles(surface, &mut session).await;
        }

        let phase = if status == CollectStatus::Cancelled {
            CrawlPhase::Aborted
        } else {
            CrawlPhase::Done
        };
        self.enter(&mut session, phase);
        self.observer.notify(&ProgressEvent::CollectionFinished {
            total: session.records.len(),
        });
        session.finish(status)
    }

    async fn scroll(
        &self,
        surface: &dyn BrowsingSurface,
        session: &mut CrawlSession,
    ) -> CollectStatus {
        self.observer.notify(&ProgressEvent::BookmarksLoaded);
        let max_passes = self.config.max_passes;

        for pass in 1..=max_passes {
            if self.cancel.is_cancelled() {
                self.observer.notify(&ProgressEvent::Cancelled {
                    collected: session.records.len(),
                });
                return CollectStatus::Cancelled;
            }

            self.enter(session, CrawlPhase::Extracting);
            let new_items = self.extract_pass(surface, session).await;
            session.finish_pass(new_items);
            self.observer.notify(&ProgressEvent::PassCompleted {
                pass,
                max_passes,
                new_items,
                total: session.records.len(),
            });

            if session.stale_passes >= self.config.stale_pass_limit {
                self.observer.notify(&ProgressEvent::Exhausted {
                    stale_passes: session.stale_passes,
                });
                return CollectStatus::Exhausted;
            }

            self.enter(session, CrawlPhase::Scrolling);
            if let Err(e) = surface
                .scroll_by_viewports(self.config.scroll_viewports)
                .await
            {
                tracing::debug!(pass, error = %e, "Scroll failed");
            }
            tokio::time::sleep(self.config.pass_delay).await;
        }

        CollectStatus::Completed
    }

    /// Parse every rendered tweet, returning how many were new.
    async fn extract_pass(&self, surface: &dyn BrowsingSurface, session: &mut CrawlSession) -> usize {
        let items = match surface.query_items(site::FEED_ITEM_SELECTOR).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read rendered tweets");
                return 0;
            }
        };

        let mut new_items = 0;
        for item in &items {
            let record = match BookmarkParser::parse(item) {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable tweet");
                    continue;
                }
            };
            if session.absorb(record) {
                new_items += 1;
            }
        }
        new_items
    }

    async fn fetch_articles(&self, surface: &dyn BrowsingSurface, session: &mut CrawlSession) {
        let pending: Vec<usize> = session
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.has_article())
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return;
        }

        self.enter(session, CrawlPhase::ArticleFetch);
        self.observer.notify(&ProgressEvent::ArticlesFetching {
            count: pending.len(),
        });

        for (n, index) in pending.into_iter().enumerate() {
            if n > 0 {
                tokio::time::sleep(self.config.article_pacing).await;
            }
            let url = session.records[index].article_url.clone();
            session.records[index].article_text = self.articles.fetch(surface, &url).await;
        }
    }

    async fn location(&self, surface: &dyn BrowsingSurface) -> String {
        surface.effective_location().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Could not read current location");
            String::new()
        })
    }

    fn enter(&self, session: &mut CrawlSession, phase: CrawlPhase) {
        session.phase = phase;
        self.observer.notify(&ProgressEvent::Phase(phase));
    }

    fn expire(&self, mut session: CrawlSession, location: String) -> CollectOutcome {
        self.enter(&mut session, CrawlPhase::SessionExpired);
        self.observer
            .notify(&ProgressEvent::SessionExpired { location });
        session.finish(CollectStatus::SessionExpired)
    }

    fn surface_failed(&self, session: CrawlSession, error: &SurfaceError) -> CollectOutcome {
        self.observer.notify(&ProgressEvent::SurfaceFailed {
            error: error.to_string(),
        });
        session.finish(CollectStatus::SurfaceFailed)
    }
}
