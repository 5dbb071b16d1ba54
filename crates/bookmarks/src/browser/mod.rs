//! Browser automation surface.
//!
//! The collector, article fetcher and session establisher drive the browser
//! only through [`BrowsingSurface`], so they can be exercised against a
//! scripted surface in tests. [`ChromeSurface`] is the chromiumoxide-backed
//! implementation used by the binary.

mod chrome;
mod session;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use chrome::{BrowserSettings, ChromeSurface};
pub use session::{SessionState, StoredCookie};

/// Errors raised by a browsing surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The browser or the DevTools protocol reported a failure.
    #[error("browser error: {0}")]
    Browser(String),

    /// An operation did not finish in time.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { timeout: Duration, what: String },

    /// Reading or writing the session file failed.
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    /// Session state could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<chromiumoxide::error::CdpError> for SurfaceError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(err.to_string())
    }
}

/// Rendered markup of one feed item, captured at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    /// `outerHTML` of the item element.
    pub html: String,
}

impl ItemSnapshot {
    /// Wrap captured markup.
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

/// A logged-in (or about to be) browser, driven sequentially.
#[async_trait]
pub trait BrowsingSurface: Send + Sync {
    /// Navigate the main view.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Location actually rendered by the main view.
    ///
    /// Reads `location.href` from the page, since SPA routing does not
    /// update the navigation URL.
    async fn effective_location(&self) -> Result<String, SurfaceError>;

    /// Effective locations of every open view.
    async fn open_view_locations(&self) -> Result<Vec<String>, SurfaceError>;

    /// Wait until `selector` matches at least one element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), SurfaceError>;

    /// Snapshot every element currently matching `selector`.
    async fn query_items(&self, selector: &str) -> Result<Vec<ItemSnapshot>, SurfaceError>;

    /// Scroll the main view down by `viewports` window heights.
    async fn scroll_by_viewports(&self, viewports: f64) -> Result<(), SurfaceError>;

    /// Open a secondary view sharing the authenticated session.
    async fn open_auxiliary_view(&self) -> Result<Box<dyn AuxiliaryView>, SurfaceError>;

    /// Write the current session state to `path`, replacing any previous file.
    async fn persist_session_state(&self, path: &Path) -> Result<(), SurfaceError>;

    /// Load session state previously written by `persist_session_state`.
    ///
    /// The main view must already show a page on the site.
    async fn restore_session_state(&self, path: &Path) -> Result<(), SurfaceError>;
}

/// A short-lived secondary view, e.g. a tab for reading one article.
#[async_trait]
pub trait AuxiliaryView: Send {
    /// Navigate, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SurfaceError>;

    /// Rendered text of the first element matching `selector`, if any.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, SurfaceError>;

    /// Close the view. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), SurfaceError>;
}
