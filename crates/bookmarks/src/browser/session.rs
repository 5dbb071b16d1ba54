//! Persisted browser session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::SurfaceError;

/// One browser cookie as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie is scoped to.
    pub domain: String,
    /// Path the cookie is scoped to.
    pub path: String,
    /// Expiry in seconds since the epoch; absent for session cookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    /// HttpOnly flag.
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag.
    #[serde(default)]
    pub secure: bool,
}

/// Browser cookies captured after a login.
///
/// Treated as an opaque credential by everything outside the browser module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Every cookie the browser held.
    pub cookies: Vec<StoredCookie>,
    /// When this state was captured.
    pub saved_at: DateTime<Utc>,
}

impl SessionState {
    /// Capture a set of cookies now.
    #[must_use]
    pub fn new(cookies: Vec<StoredCookie>) -> Self {
        Self {
            cookies,
            saved_at: Utc::now(),
        }
    }

    /// Load session from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SurfaceError> {
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Save session to a JSON file, overwriting it.
    pub fn save(&self, path: &Path) -> Result<(), SurfaceError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a cookie by name.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Whether the long-lived `auth_token` cookie is present.
    #[must_use]
    pub fn has_auth_token(&self) -> bool {
        self.cookie("auth_token").is_some_and(|c| !c.value.is_empty())
    }
}
