//! Scripted browsing surface and helpers for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{AuxiliaryView, BrowsingSurface, ItemSnapshot, SurfaceError};
use crate::cancel::CancelToken;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::site;

/// Where a login wall bounces the bookmarks page.
pub const LOGIN_REDIRECT: &str = "https://x.com/i/flow/login?redirect_after_login=%2Fi%2Fbookmarks";

/// How an article page behaves in an auxiliary view.
#[derive(Debug, Clone)]
pub enum FakeArticle {
    /// Body under the article testid.
    Body(String),
    /// Body only reachable through the structural fallback.
    Fallback(String),
    /// Page loads but has no body.
    Missing,
    /// Navigation fails.
    NavigationFails,
}

impl FakeArticle {
    pub fn body(text: &str) -> Self {
        Self::Body(text.to_string())
    }

    pub fn fallback(text: &str) -> Self {
        Self::Fallback(text.to_string())
    }
}

#[derive(Default)]
struct FakeState {
    authenticated: bool,
    location: String,
    passes: Vec<Vec<ItemSnapshot>>,
    cursor: usize,
    wait_timeout: bool,
    redirect_while_waiting: bool,
    view_script: VecDeque<Vec<String>>,
    articles: HashMap<String, FakeArticle>,
    cancel_on_query: Option<(usize, CancelToken)>,
    failing_persist: bool,
    queries: usize,
    scrolls: usize,
    waits: usize,
    views_opened: usize,
    views_closed: usize,
    navigations: Vec<String>,
    persisted: Vec<PathBuf>,
    restored: Vec<PathBuf>,
}

/// In-memory [`BrowsingSurface`] replaying a scripted timeline.
///
/// Each scroll advances to the next scripted pass; once the script runs out
/// the last pass keeps being served.
#[derive(Clone)]
pub struct FakeSurface {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSurface {
    /// An authenticated surface with an empty timeline.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                authenticated: true,
                location: "about:blank".to_string(),
                ..FakeState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn update(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state());
        self
    }

    pub fn with_passes(self, passes: Vec<Vec<ItemSnapshot>>) -> Self {
        self.update(|s| s.passes = passes)
    }

    /// Bookmarks redirect to the login wall until someone logs in.
    pub fn unauthenticated(self) -> Self {
        self.update(|s| s.authenticated = false)
    }

    pub fn with_wait_timeout(self) -> Self {
        self.update(|s| s.wait_timeout = true)
    }

    pub fn redirect_to_login_while_waiting(self) -> Self {
        self.update(|s| s.redirect_while_waiting = true)
    }

    /// Locations reported by successive tab polls; the last entry repeats.
    pub fn with_view_locations(self, script: Vec<Vec<&str>>) -> Self {
        self.update(|s| {
            s.view_script = script
                .into_iter()
                .map(|views| views.into_iter().map(str::to_string).collect())
                .collect();
        })
    }

    pub fn with_article(self, url: &str, article: FakeArticle) -> Self {
        self.update(|s| {
            s.articles.insert(url.to_string(), article);
        })
    }

    /// Request cancellation while serving the `n`th item query.
    pub fn cancel_on_query(self, n: usize, cancel: CancelToken) -> Self {
        self.update(|s| s.cancel_on_query = Some((n, cancel)))
    }

    pub fn failing_persist(self) -> Self {
        self.update(|s| s.failing_persist = true)
    }

    pub fn scrolls(&self) -> usize {
        self.state().scrolls
    }

    pub fn waits(&self) -> usize {
        self.state().waits
    }

    pub fn views_opened(&self) -> usize {
        self.state().views_opened
    }

    pub fn views_closed(&self) -> usize {
        self.state().views_closed
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn persisted(&self) -> Vec<PathBuf> {
        self.state().persisted.clone()
    }

    pub fn restored(&self) -> Vec<PathBuf> {
        self.state().restored.clone()
    }
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowsingSurface for FakeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        state.cursor = 0;
        state.location = if url == site::BOOKMARKS_URL && !state.authenticated {
            LOGIN_REDIRECT.to_string()
        } else {
            url.to_string()
        };
        Ok(())
    }

    async fn effective_location(&self) -> Result<String, SurfaceError> {
        Ok(self.state().location.clone())
    }

    async fn open_view_locations(&self) -> Result<Vec<String>, SurfaceError> {
        let mut state = self.state();
        let locations = if state.view_script.len() > 1 {
            state.view_script.pop_front().unwrap_or_default()
        } else if let Some(last) = state.view_script.front() {
            last.clone()
        } else {
            vec![state.location.clone()]
        };
        if locations.iter().any(|l| site::is_authenticated_location(l)) {
            state.authenticated = true;
        }
        Ok(locations)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.waits += 1;
        if state.redirect_while_waiting {
            state.location = LOGIN_REDIRECT.to_string();
        }
        if state.wait_timeout {
            return Err(SurfaceError::Timeout {
                timeout,
                what: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn query_items(&self, _selector: &str) -> Result<Vec<ItemSnapshot>, SurfaceError> {
        let mut state = self.state();
        state.queries += 1;
        if let Some((n, cancel)) = &state.cancel_on_query {
            if *n == state.queries {
                cancel.cancel();
            }
        }
        let index = state.cursor.min(state.passes.len().saturating_sub(1));
        Ok(state.passes.get(index).cloned().unwrap_or_default())
    }

    async fn scroll_by_viewports(&self, _viewports: f64) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.scrolls += 1;
        state.cursor += 1;
        Ok(())
    }

    async fn open_auxiliary_view(&self) -> Result<Box<dyn AuxiliaryView>, SurfaceError> {
        self.state().views_opened += 1;
        Ok(Box::new(FakeView {
            surface: self.clone(),
            article: None,
            closed: false,
        }))
    }

    async fn persist_session_state(&self, path: &Path) -> Result<(), SurfaceError> {
        if self.state().failing_persist {
            return Err(SurfaceError::Browser("cookie store unavailable".to_string()));
        }
        std::fs::write(path, r#"{"cookies":[]}"#)?;
        self.state().persisted.push(path.to_path_buf());
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> Result<(), SurfaceError> {
        let mut state = self.state();
        // Browsers refuse cookies for pages without an origin
        if !state.location.starts_with("http") {
            return Err(SurfaceError::Browser(format!(
                "cannot set cookies on {}",
                state.location
            )));
        }
        state.restored.push(path.to_path_buf());
        Ok(())
    }
}

struct FakeView {
    surface: FakeSurface,
    article: Option<FakeArticle>,
    closed: bool,
}

#[async_trait]
impl AuxiliaryView for FakeView {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        let article = self
            .surface
            .state()
            .articles
            .get(url)
            .cloned()
            .unwrap_or(FakeArticle::Missing);
        if matches!(article, FakeArticle::NavigationFails) {
            return Err(SurfaceError::Timeout {
                timeout,
                what: url.to_string(),
            });
        }
        self.article = Some(article);
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, SurfaceError> {
        let text = match &self.article {
            Some(FakeArticle::Body(text)) if selector == site::ARTICLE_BODY_SELECTOR => {
                Some(text.clone())
            }
            Some(FakeArticle::Fallback(text)) if selector == site::ARTICLE_FALLBACK_SELECTOR => {
                Some(text.clone())
            }
            _ => None,
        };
        Ok(text)
    }

    async fn close(&mut self) -> Result<(), SurfaceError> {
        if !self.closed {
            self.closed = true;
            self.surface.state().views_closed += 1;
        }
        Ok(())
    }
}

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn notify(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn render_tweet(permalink: Option<u64>, text: &str, extra: &str) -> ItemSnapshot {
    let time = permalink.map_or_else(String::new, |id| {
        format!(
            r#"<a role="link" href="/user/status/{id}"><time datetime="2024-01-01T00:00:00.000Z">Jan 1</time></a>"#
        )
    });
    ItemSnapshot::new(format!(
        concat!(
            r#"<article data-testid="tweet">"#,
            r#"<div data-testid="User-Name"><a role="link" href="/user"><span>User</span></a>{time}</div>"#,
            r#"<div data-testid="tweetText"><span>{text}</span></div>"#,
            "{extra}",
            "</article>",
        ),
        time = time,
        text = text,
        extra = extra,
    ))
}

/// A tweet by `@user` with permalink `https://x.com/user/status/{id}`.
pub fn tweet(id: u64, text: &str) -> ItemSnapshot {
    render_tweet(Some(id), text, "")
}

/// A tweet embedding an X Article at `article_url`.
pub fn tweet_with_article(id: u64, text: &str, article_url: &str) -> ItemSnapshot {
    render_tweet(
        Some(id),
        text,
        &format!(r#"<a href="{article_url}">Read article</a>"#),
    )
}

/// A tweet whose timestamp anchor did not render.
pub fn tweet_without_permalink(text: &str) -> ItemSnapshot {
    render_tweet(None, text, "")
}
