//! Twitter/X bookmark exporter.
//!
//! This crate provides:
//! - Bookmark collection by scrolling the timeline in a real browser
//! - Interactive login with a reusable stored session
//! - Full-text fetching of X native Articles
//! - t.co expansion and CSV/JSONL export

pub mod app;
pub mod auth;
pub mod browser;
pub mod cancel;
pub mod enrichment;
pub mod progress;
pub mod site;
pub mod storage;
pub mod twitter;

#[cfg(test)]
mod testing;

// Re-export main types
pub use app::{RunConfig, RunSummary, Runner};
pub use browser::{BrowsingSurface, ChromeSurface};
pub use cancel::{CancelLevel, CancelToken};
pub use progress::{ProgressEvent, ProgressObserver, TracingObserver};
pub use storage::OutputFormat;
pub use twitter::{BookmarkRecord, CollectStatus};
