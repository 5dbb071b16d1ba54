//! Session establishment for Twitter/X.
//!
//! Reuses a stored session when one exists, otherwise waits for the user to
//! log in by hand in the browser window and stores the resulting session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::browser::{BrowsingSurface, SurfaceError};
use crate::cancel::CancelToken;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::site;

/// Configuration for the interactive login wait.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// How often open tabs are checked.
    pub poll_interval: Duration,
    /// Minimum time between "still waiting" reports.
    pub progress_interval: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            progress_interval: Duration::from_secs(5),
        }
    }
}

/// Errors that end session establishment.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Headless mode needs a stored session.
    #[error("no session file found at '{}'; run without --headless first to log in", .0.display())]
    NoStoredSession(PathBuf),

    /// The user never got past the login wall.
    #[error("login failed or was cancelled")]
    LoginAbandoned,

    /// The browser failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// How a session may be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstablishMode {
    /// Use the stored session, log in interactively without one.
    PreferStored,
    /// Use the stored session or fail (headless).
    RequireStored,
    /// Always log in interactively, even with a stored session.
    ForceLogin,
}

/// How the session was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Loaded from the session file.
    Restored,
    /// The user logged in during this run.
    LoggedIn,
}

/// Makes sure the browser is authenticated.
pub struct SessionEstablisher {
    config: LoginConfig,
    auth_file: PathBuf,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
}

impl SessionEstablisher {
    /// Create a new session establisher storing sessions at `auth_file`.
    pub fn new(
        config: LoginConfig,
        auth_file: PathBuf,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            auth_file,
            observer,
            cancel,
        }
    }

    /// Authenticate `surface` according to `mode`.
    pub async fn establish(
        &self,
        surface: &dyn BrowsingSurface,
        mode: EstablishMode,
    ) -> Result<SessionOutcome, SessionError> {
        let restored = self.auth_file.exists() && self.restore(surface).await;

        match mode {
            EstablishMode::ForceLogin => {
                self.login(surface).await?;
                Ok(SessionOutcome::LoggedIn)
            }
            _ if restored => Ok(SessionOutcome::Restored),
            EstablishMode::RequireStored => {
                Err(SessionError::NoStoredSession(self.auth_file.clone()))
            }
            EstablishMode::PreferStored => {
                self.login(surface).await?;
                Ok(SessionOutcome::LoggedIn)
            }
        }
    }

    /// Load the stored session. Cookies can only be set from a page on the
    /// site, so a blank tab is moved to the home page first.
    async fn restore(&self, surface: &dyn BrowsingSurface) -> bool {
        let location = surface.effective_location().await.unwrap_or_default();
        if !location.starts_with("http") {
            if let Err(e) = surface.navigate(site::HOME_URL).await {
                tracing::warn!(error = %e, "Could not open the home page to restore the session");
                return false;
            }
        }
        match surface.restore_session_state(&self.auth_file).await {
            Ok(()) => {
                tracing::info!(path = %self.auth_file.display(), "Loaded existing session");
                true
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.auth_file.display(),
                    error = %e,
                    "Stored session is unusable"
                );
                false
            }
        }
    }

    /// Wait for the user to log in and persist the session.
    ///
    /// Login counts as done as soon as any open tab leaves the login wall.
    /// On cancellation the loop stops at its next check and whatever session
    /// state exists is still saved.
    pub async fn login(&self, surface: &dyn BrowsingSurface) -> Result<(), SessionError> {
        surface.navigate(site::LOGIN_URL).await?;
        self.observer.notify(&ProgressEvent::LoginPrompt);

        let mut last_progress: Option<Instant> = None;
        let mut logged_in = false;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let locations = match surface.open_view_locations().await {
                Ok(locations) => locations,
                Err(e) => {
                    tracing::debug!(error = %e, "Login loop error");
                    break;
                }
            };
            if locations.is_empty() {
                tracing::debug!("All browser tabs closed during login");
                break;
            }

            if last_progress.map_or(true, |at| at.elapsed() >= self.config.progress_interval) {
                self.observer.notify(&ProgressEvent::WaitingForLogin {
                    location: locations.last().cloned(),
                });
                last_progress = Some(Instant::now());
            }

            if locations.iter().any(|l| site::is_authenticated_location(l)) {
                self.observer.notify(&ProgressEvent::LoginDetected);
                logged_in = self.persist(surface, false).await;
                break;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        if !logged_in && self.cancel.is_cancelled() {
            self.persist(surface, true).await;
        }

        if logged_in {
            Ok(())
        } else {
            Err(SessionError::LoginAbandoned)
        }
    }

    async fn persist(&self, surface: &dyn BrowsingSurface, partial: bool) -> bool {
        let path = self.auth_file.clone();
        match surface.persist_session_state(&path).await {
            Ok(()) => {
                let event = if partial {
                    ProgressEvent::PartialSessionSaved { path }
                } else {
                    ProgressEvent::SessionSaved { path }
                };
                self.observer.notify(&event);
                true
            }
            Err(e) => {
                self.observer.notify(&ProgressEvent::SessionSaveFailed {
                    path,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
