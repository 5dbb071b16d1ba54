//! chromiumoxide-backed browsing surface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::session::{SessionState, StoredCookie};
use super::{AuxiliaryView, BrowsingSurface, ItemSnapshot, SurfaceError};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Extra command-line switches.
    pub args: Vec<String>,
    /// Browser binary to launch instead of the detected one.
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1280,
            viewport_height: 900,
            args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(), // Avoid /dev/shm size issues in containers
            ],
            executable: None,
        }
    }
}

/// A launched Chrome/Chromium with one main tab.
pub struct ChromeSurface {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSurface {
    /// Launch the browser and open the main tab.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, SurfaceError> {
        tracing::info!(headless = settings.headless, "Launching browser");

        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                ..Viewport::default()
            });
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &settings.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| SurfaceError::Browser(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            SurfaceError::Browser(format!(
                "Failed to launch browser: {e}. Is Chrome or Chromium installed and in PATH?"
            ))
        })?;

        // Spawn handler task
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            handler: handle,
        })
    }

    /// Close the browser and wait for the handler to drain.
    pub async fn close(mut self) -> Result<(), SurfaceError> {
        self.browser.close().await?;
        self.handler
            .await
            .map_err(|e| SurfaceError::Browser(format!("Browser handler task failed: {e}")))?;
        Ok(())
    }
}

async fn location_of(page: &Page) -> Result<String, SurfaceError> {
    match page.evaluate("location.href").await {
        Ok(result) => Ok(result.into_value::<String>()?),
        Err(e) => {
            tracing::debug!(error = %e, "location.href unavailable, using navigation URL");
            Ok(page.url().await?.unwrap_or_default())
        }
    }
}

fn stored_cookie(cookie: Cookie) -> StoredCookie {
    StoredCookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
        http_only: cookie.http_only,
        secure: cookie.secure,
    }
}

fn cookie_param(cookie: &StoredCookie) -> Result<CookieParam, SurfaceError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder
        .build()
        .map_err(|e| SurfaceError::Browser(format!("Failed to build cookie {}: {e}", cookie.name)))
}

#[async_trait]
impl BrowsingSurface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        tracing::debug!(url, "Navigating");
        self.page.goto(url).await?;
        Ok(())
    }

    async fn effective_location(&self) -> Result<String, SurfaceError> {
        location_of(&self.page).await
    }

    async fn open_view_locations(&self) -> Result<Vec<String>, SurfaceError> {
        let pages = self.browser.pages().await?;
        let mut locations = Vec::with_capacity(pages.len());
        for page in &pages {
            match location_of(page).await {
                Ok(location) => locations.push(location),
                Err(e) => tracing::debug!(error = %e, "Skipping unreadable tab"),
            }
        }
        Ok(locations)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SurfaceError::Timeout {
                    timeout,
                    what: selector.to_string(),
                });
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn query_items(&self, selector: &str) -> Result<Vec<ItemSnapshot>, SurfaceError> {
        let selector = serde_json::to_string(selector)?;
        let script = format!(
            "Array.from(document.querySelectorAll({selector})).map(el => el.outerHTML)"
        );
        let html: Vec<String> = self.page.evaluate(script).await?.into_value()?;
        Ok(html.into_iter().map(ItemSnapshot::new).collect())
    }

    async fn scroll_by_viewports(&self, viewports: f64) -> Result<(), SurfaceError> {
        self.page
            .evaluate(format!("window.scrollBy(0, window.innerHeight * {viewports})"))
            .await?;
        Ok(())
    }

    async fn open_auxiliary_view(&self) -> Result<Box<dyn AuxiliaryView>, SurfaceError> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromeTab { page: Some(page) }))
    }

    async fn persist_session_state(&self, path: &Path) -> Result<(), SurfaceError> {
        // CDP cookies include HttpOnly ones such as auth_token, unlike document.cookie
        let cookies = self.page.get_cookies().await?;
        let state = SessionState::new(cookies.into_iter().map(stored_cookie).collect());
        state.save(path)?;
        tracing::debug!(path = %path.display(), cookies = state.cookies.len(), "Persisted session");
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> Result<(), SurfaceError> {
        let state = SessionState::load(path)?;
        if !state.has_auth_token() {
            tracing::warn!(path = %path.display(), "Stored session has no auth_token cookie");
        }
        let location = location_of(&self.page).await?;
        if !location.starts_with("http") {
            return Err(SurfaceError::Browser(format!(
                "cannot restore cookies on {location}, open the site first"
            )));
        }
        let params = state
            .cookies
            .iter()
            .map(cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        self.page.set_cookies(params).await?;
        tracing::debug!(path = %path.display(), cookies = state.cookies.len(), "Restored session");
        Ok(())
    }
}

/// Secondary tab in the same browser, sharing its cookies.
struct ChromeTab {
    page: Option<Page>,
}

impl ChromeTab {
    fn page(&self) -> Result<&Page, SurfaceError> {
        self.page
            .as_ref()
            .ok_or_else(|| SurfaceError::Browser("tab already closed".to_string()))
    }
}

#[async_trait]
impl AuxiliaryView for ChromeTab {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(SurfaceError::Timeout {
                timeout,
                what: url.to_string(),
            }),
        }
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, SurfaceError> {
        let page = self.page()?;
        let Ok(element) = page.find_element(selector).await else {
            return Ok(None);
        };
        Ok(element.inner_text().await?)
    }

    async fn close(&mut self) -> Result<(), SurfaceError> {
        if let Some(page) = self.page.take() {
            page.close().await?;
        }
        Ok(())
    }
}
