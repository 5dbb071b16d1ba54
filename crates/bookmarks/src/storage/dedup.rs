//! Cross-run duplicate detection for exported bookmarks.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::twitter::BookmarkRecord;

/// Tracks dedup keys of bookmarks exported by earlier runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DedupTracker {
    /// Keys already exported.
    exported_keys: BTreeSet<String>,
}

impl DedupTracker {
    /// Load tracker from a JSON file. A missing file yields an empty tracker.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            let tracker: Self = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse state file {}", path.display()))?;
            Ok(tracker)
        } else {
            Ok(Self::default())
        }
    }

    /// Save tracker to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        Ok(())
    }

    /// Check if a key was exported before.
    #[must_use]
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.exported_keys.contains(key)
    }

    /// Remember every keyed record. Returns how many keys were new.
    pub fn record(&mut self, records: &[BookmarkRecord]) -> usize {
        records
            .iter()
            .filter_map(BookmarkRecord::dedup_key)
            .filter(|key| self.exported_keys.insert(key.clone()))
            .count()
    }

    /// Known keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.exported_keys.iter()
    }

    /// Get the count of known keys.
    #[must_use]
    pub fn count(&self) -> usize {
        self.exported_keys.len()
    }
}
