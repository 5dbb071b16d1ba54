//! Twitter data types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of leading text characters used as a fallback dedup key.
pub const TEXT_KEY_CHARS: usize = 80;

/// A bookmarked tweet as scraped from the timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    /// ISO-8601 timestamp from the `<time>` element, empty if missing.
    #[serde(default)]
    pub timestamp: String,
    /// Display name.
    #[serde(default)]
    pub author_name: String,
    /// Handle with `@` prefix, empty if missing.
    #[serde(default)]
    pub author_handle: String,
    /// Tweet text, newlines collapsed to spaces.
    #[serde(default)]
    pub text: String,
    /// Permalink to the tweet.
    #[serde(default)]
    pub item_url: String,
    /// Embedded X Article, empty if none.
    #[serde(default)]
    pub article_url: String,
    /// Full text of the X Article, filled in after collection.
    #[serde(default)]
    pub article_text: String,
    /// Original-resolution photo URLs.
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// External links, sorted and unique.
    #[serde(default)]
    pub raw_links: BTreeSet<String>,
}

impl BookmarkRecord {
    /// Key used to recognise the same tweet across scroll passes.
    ///
    /// The permalink when known, otherwise the first 80 characters of the
    /// text. Two distinct tweets without permalinks whose text starts the
    /// same collapse into one. `None` when there is nothing to key on.
    #[must_use]
    pub fn dedup_key(&self) -> Option<String> {
        if !self.item_url.is_empty() {
            return Some(self.item_url.clone());
        }
        if self.text.is_empty() {
            return None;
        }
        Some(self.text.chars().take(TEXT_KEY_CHARS).collect())
    }

    /// Whether the tweet embeds an X Article.
    #[must_use]
    pub fn has_article(&self) -> bool {
        !self.article_url.is_empty()
    }
}
