//! t.co link expansion.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Error resolving a single link.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The worker pool shut down before the link was looked up.
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for link expansion.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Concurrent lookups.
    pub workers: usize,
    /// Timeout per lookup.
    pub timeout: Duration,
    /// User agent sent with lookups.
    pub user_agent: String,
    /// Max redirects followed per lookup.
    pub max_redirects: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0".to_string(),
            max_redirects: 10,
        }
    }
}

/// Follows a redirect chain to its final URL.
#[async_trait]
pub trait RedirectFollower: Send + Sync {
    /// Final destination of `url`.
    async fn follow(&self, url: &str) -> Result<String, ResolveError>;
}

/// Follows redirects with HEAD requests.
pub struct HttpRedirectFollower {
    client: Client,
}

impl HttpRedirectFollower {
    /// Create a new follower.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RedirectFollower for HttpRedirectFollower {
    async fn follow(&self, url: &str) -> Result<String, ResolveError> {
        let response = self.client.head(url).send().await?;
        Ok(response.url().to_string())
    }
}

/// Shortened link to final destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLinkMap {
    links: HashMap<String, String>,
}

impl ResolvedLinkMap {
    /// Record a resolution.
    pub fn insert(&mut self, short: String, destination: String) {
        self.links.insert(short, destination);
    }

    /// Destination of `url`, or `url` itself when unknown.
    #[must_use]
    pub fn expand<'a>(&'a self, url: &'a str) -> &'a str {
        self.links.get(url).map_or(url, String::as_str)
    }

    /// Number of links that resolved somewhere other than themselves.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.links.iter().filter(|(short, dest)| short != dest).count()
    }

    /// Number of links looked up.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether nothing was looked up.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Resolves shortened links with a bounded worker pool.
pub struct LinkResolver {
    follower: Arc<dyn RedirectFollower>,
    workers: usize,
}

impl LinkResolver {
    /// Create a resolver using `workers` concurrent lookups.
    pub fn new(follower: Arc<dyn RedirectFollower>, workers: usize) -> Self {
        Self {
            follower,
            workers: workers.max(1),
        }
    }

    /// Create an HTTP-backed resolver.
    pub fn http(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let follower = HttpRedirectFollower::new(config)?;
        Ok(Self::new(Arc::new(follower), config.workers))
    }

    /// Resolve every URL in `urls`.
    ///
    /// Never fails: a URL that cannot be resolved maps to itself.
    pub async fn resolve_all(&self, urls: &BTreeSet<String>) -> ResolvedLinkMap {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let url = url.clone();
            let follower = self.follower.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let resolved = match semaphore.acquire_owned().await {
                    Ok(_permit) => follower.follow(&url).await,
                    Err(e) => Err(ResolveError::Unavailable(e.to_string())),
                };
                (url, resolved)
            }));
        }

        let mut map = ResolvedLinkMap::default();
        for handle in handles {
            match handle.await {
                Ok((url, Ok(destination))) => map.insert(url, destination),
                Ok((url, Err(e))) => {
                    tracing::debug!(url, error = %e, "Could not expand link");
                    map.insert(url.clone(), url);
                }
                Err(e) => tracing::error!(error = %e, "Link expansion task failed"),
            }
        }
        map
    }
}
