//! Twitter/X bookmark collection.
//!
//! Scrolls the bookmarks timeline, parses tweets and reads X Articles.

mod article;
mod collector;
mod parser;
mod types;

pub use article::{ArticleConfig, ArticleFetcher};
pub use collector::{CollectConfig, CollectOutcome, CollectStatus, Collector, CrawlPhase};
pub use parser::{BookmarkParser, ParseError};
pub use types::{BookmarkRecord, TEXT_KEY_CHARS};
