//! Bookmark storage module.
//!
//! Writes exported bookmarks as CSV and JSONL and remembers what earlier
//! runs already exported.

mod dedup;
mod export;

pub use dedup::DedupTracker;
pub use export::{
    normalize_stem, read_jsonl, write_csv, write_jsonl, ExportError, ExportRow, Exporter,
    OutputFormat, CSV_COLUMNS, MULTI_VALUE_SEPARATOR,
};
