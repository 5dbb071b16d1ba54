//! X native Article fetching.

use std::sync::Arc;
use std::time::Duration;

use crate::browser::{AuxiliaryView, BrowsingSurface, SurfaceError};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::site;

/// Configuration for article fetching.
#[derive(Debug, Clone)]
pub struct ArticleConfig {
    /// Navigation timeout for one article.
    pub timeout: Duration,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Reads the full body of X Articles in a separate tab.
pub struct ArticleFetcher {
    config: ArticleConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl ArticleFetcher {
    /// Create a new article fetcher.
    pub fn new(config: ArticleConfig, observer: Arc<dyn ProgressObserver>) -> Self {
        Self { config, observer }
    }

    /// Fetch the body text of one article.
    ///
    /// Returns an empty string on any failure; the tab is always closed.
    pub async fn fetch(&self, surface: &dyn BrowsingSurface, article_url: &str) -> String {
        self.observer.notify(&ProgressEvent::ArticleFetching {
            url: article_url.to_string(),
        });

        match self.try_fetch(surface, article_url).await {
            Ok(text) => text,
            Err(e) => {
                self.observer.notify(&ProgressEvent::ArticleFailed {
                    url: article_url.to_string(),
                    error: e.to_string(),
                });
                String::new()
            }
        }
    }

    async fn try_fetch(
        &self,
        surface: &dyn BrowsingSurface,
        article_url: &str,
    ) -> Result<String, SurfaceError> {
        let mut view = surface.open_auxiliary_view().await?;
        let extracted = self.extract(view.as_mut(), article_url).await;
        if let Err(e) = view.close().await {
            tracing::debug!(url = article_url, error = %e, "Failed to close article tab");
        }
        extracted
    }

    async fn extract(
        &self,
        view: &mut dyn AuxiliaryView,
        article_url: &str,
    ) -> Result<String, SurfaceError> {
        view.navigate(article_url, self.config.timeout).await?;

        let body = match view.text_of(site::ARTICLE_BODY_SELECTOR).await? {
            Some(text) => Some(text),
            None => view.text_of(site::ARTICLE_FALLBACK_SELECTOR).await?,
        };
        Ok(body.unwrap_or_default().trim().to_string())
    }
}
