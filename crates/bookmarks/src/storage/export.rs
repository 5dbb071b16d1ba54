//! CSV and JSONL export.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enrichment::{LinkResolver, ResolvedLinkMap};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::site;
use crate::twitter::BookmarkRecord;

/// CSV header, in column order.
pub const CSV_COLUMNS: [&str; 9] = [
    "timestamp",
    "author_name",
    "author_handle",
    "text",
    "item_url",
    "image_urls",
    "article_url",
    "article_text",
    "urls_expanded",
];

/// Joins multi-valued fields in CSV cells.
pub const MULTI_VALUE_SEPARATOR: &str = " | ";

/// Errors writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File I/O failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV encoding failed.
    #[error("failed to write CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    /// JSON encoding or decoding failed.
    #[error("failed to encode JSONL {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Which files to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// `<stem>.csv` only.
    #[default]
    Csv,
    /// `<stem>.jsonl` only.
    Jsonl,
    /// Both files.
    Both,
}

impl OutputFormat {
    /// Whether a CSV file is written.
    #[must_use]
    pub fn includes_csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }

    /// Whether a JSONL file is written.
    #[must_use]
    pub fn includes_jsonl(self) -> bool {
        matches!(self, Self::Jsonl | Self::Both)
    }
}

/// One exported bookmark with links expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub timestamp: String,
    pub author_name: String,
    pub author_handle: String,
    pub text: String,
    pub item_url: String,
    pub image_urls: Vec<String>,
    pub article_url: String,
    pub article_text: String,
    pub urls_expanded: Vec<String>,
}

impl ExportRow {
    /// Build a row, replacing each raw link with its resolved destination.
    #[must_use]
    pub fn from_record(record: &BookmarkRecord, links: &ResolvedLinkMap) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            author_name: record.author_name.clone(),
            author_handle: record.author_handle.clone(),
            text: record.text.clone(),
            item_url: record.item_url.clone(),
            image_urls: record.image_urls.clone(),
            article_url: record.article_url.clone(),
            article_text: record.article_text.clone(),
            urls_expanded: record
                .raw_links
                .iter()
                .map(|url| links.expand(url).to_string())
                .collect(),
        }
    }

    /// Cells in [`CSV_COLUMNS`] order.
    #[must_use]
    pub fn csv_record(&self) -> [String; 9] {
        [
            self.timestamp.clone(),
            self.author_name.clone(),
            self.author_handle.clone(),
            self.text.clone(),
            self.item_url.clone(),
            self.image_urls.join(MULTI_VALUE_SEPARATOR),
            self.article_url.clone(),
            self.article_text.clone(),
            self.urls_expanded.join(MULTI_VALUE_SEPARATOR),
        ]
    }
}

/// Strip a trailing `.csv` / `.jsonl` from a user-supplied output stem.
#[must_use]
pub fn normalize_stem(stem: &str) -> PathBuf {
    let stem = stem.strip_suffix(".csv").unwrap_or(stem);
    let stem = stem.strip_suffix(".jsonl").unwrap_or(stem);
    PathBuf::from(stem)
}

fn with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Write rows as CSV with a header line.
pub fn write_csv(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(CSV_COLUMNS).map_err(csv_err)?;
    for row in rows {
        writer.write_record(row.csv_record()).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write rows as one JSON object per line.
pub fn write_jsonl(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row).map_err(|source| ExportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Read rows back from a JSONL file.
pub fn read_jsonl(path: &Path) -> Result<Vec<ExportRow>, ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(
            serde_json::from_str(&line).map_err(|source| ExportError::Json {
                path: path.to_path_buf(),
                source,
            })?,
        );
    }
    Ok(rows)
}

/// Expands short links once per run and writes the export files.
pub struct Exporter {
    resolver: LinkResolver,
    observer: Arc<dyn ProgressObserver>,
}

impl Exporter {
    /// Create a new exporter.
    pub fn new(resolver: LinkResolver, observer: Arc<dyn ProgressObserver>) -> Self {
        Self { resolver, observer }
    }

    /// Resolve links and write `<stem>.csv` and/or `<stem>.jsonl`.
    ///
    /// Each file is written in full or the error is returned; files already
    /// written are left in place.
    pub async fn export(
        &self,
        records: &[BookmarkRecord],
        stem: &Path,
        format: OutputFormat,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let links = self.resolve_links(records).await;
        let rows: Vec<ExportRow> = records
            .iter()
            .map(|record| ExportRow::from_record(record, &links))
            .collect();

        let mut written = Vec::new();
        if format.includes_csv() {
            let path = with_extension(stem, "csv");
            write_csv(&path, &rows)?;
            self.observer
                .notify(&ProgressEvent::FileWritten { path: path.clone() });
            written.push(path);
        }
        if format.includes_jsonl() {
            let path = with_extension(stem, "jsonl");
            write_jsonl(&path, &rows)?;
            self.observer
                .notify(&ProgressEvent::FileWritten { path: path.clone() });
            written.push(path);
        }
        Ok(written)
    }

    /// Resolve every t.co link referenced by any record, once.
    pub async fn resolve_links(&self, records: &[BookmarkRecord]) -> ResolvedLinkMap {
        let short: BTreeSet<String> = records
            .iter()
            .flat_map(|record| record.raw_links.iter())
            .filter(|url| site::is_short_link(url))
            .cloned()
            .collect();

        self.observer
            .notify(&ProgressEvent::LinksResolving { count: short.len() });
        let links = if short.is_empty() {
            ResolvedLinkMap::default()
        } else {
            self.resolver.resolve_all(&short).await
        };
        self.observer.notify(&ProgressEvent::LinksResolved {
            resolved: links.resolved_count(),
            total: short.len(),
        });
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{RedirectFollower, ResolveError};
    use crate::progress::SilentObserver;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Resolves from a fixed table; anything else fails.
    struct TableFollower(HashMap<String, String>);

    #[async_trait]
    impl RedirectFollower for TableFollower {
        async fn follow(&self, url: &str) -> Result<String, ResolveError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| ResolveError::Unavailable(format!("no route to {url}")))
        }
    }

    fn exporter(table: &[(&str, &str)]) -> Exporter {
        let table = table
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Exporter::new(
            LinkResolver::new(Arc::new(TableFollower(table)), 4),
            Arc::new(SilentObserver),
        )
    }

    fn record(item_url: &str, links: &[&str]) -> BookmarkRecord {
        BookmarkRecord {
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            author_name: "Jack".to_string(),
            author_handle: "@jack".to_string(),
            text: "hello, \"world\"".to_string(),
            item_url: item_url.to_string(),
            raw_links: links.iter().map(|l| (*l).to_string()).collect(),
            ..BookmarkRecord::default()
        }
    }

    fn csv_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        assert_eq!(reader.headers().unwrap(), &CSV_COLUMNS[..]);
        reader.records().map(Result::unwrap).collect()
    }

    #[tokio::test]
    async fn test_short_links_expanded_in_csv() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("bookmarks");
        let exporter = exporter(&[("https://t.co/abc123", "https://example.com/page")]);

        let written = exporter
            .export(
                &[record("https://x.com/jack/status/1", &["https://t.co/abc123"])],
                &stem,
                OutputFormat::Csv,
            )
            .await
            .unwrap();

        assert_eq!(written, vec![dir.path().join("bookmarks.csv")]);
        let rows = csv_rows(&written[0]);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][8], "https://example.com/page");
        assert_eq!(&rows[0][3], "hello, \"world\"");
    }

    #[tokio::test]
    async fn test_failed_resolution_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("out");
        let exporter = exporter(&[("https://t.co/good", "https://example.com/good")]);

        exporter
            .export(
                &[record(
                    "https://x.com/jack/status/1",
                    &["https://t.co/bad", "https://t.co/good", "https://github.com/x"],
                )],
                &stem,
                OutputFormat::Csv,
            )
            .await
            .unwrap();

        let rows = csv_rows(&dir.path().join("out.csv"));
        assert_eq!(
            &rows[0][8],
            "https://github.com/x | https://t.co/bad | https://example.com/good"
        );
    }

    #[tokio::test]
    async fn test_jsonl_round_trip_preserves_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("bookmarks");
        let records = vec![
            BookmarkRecord {
                image_urls: vec![
                    "https://pbs.twimg.com/media/A?name=orig".to_string(),
                    "https://pbs.twimg.com/media/B?name=orig".to_string(),
                ],
                article_url: "https://x.com/jack/articles/1".to_string(),
                article_text: "Línea uno\nLínea dos".to_string(),
                ..record("https://x.com/jack/status/1", &["https://t.co/abc123"])
            },
            BookmarkRecord::default(),
        ];
        let exporter = exporter(&[("https://t.co/abc123", "https://example.com/page")]);

        let written = exporter
            .export(&records, &stem, OutputFormat::Jsonl)
            .await
            .unwrap();

        assert_eq!(written, vec![dir.path().join("bookmarks.jsonl")]);
        let rows = read_jsonl(&written[0]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].image_urls.len(), 2);
        assert_eq!(rows[0].article_text, "Línea uno\nLínea dos");
        assert_eq!(rows[0].urls_expanded, vec!["https://example.com/page".to_string()]);
        assert_eq!(
            rows[1],
            ExportRow::from_record(&BookmarkRecord::default(), &ResolvedLinkMap::default())
        );
        assert!(rows[1].urls_expanded.is_empty());
        assert!(rows[1].text.is_empty());
    }

    #[tokio::test]
    async fn test_both_formats_written() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("all");

        let written = exporter(&[])
            .export(&[record("u", &[])], &stem, OutputFormat::Both)
            .await
            .unwrap();

        assert_eq!(
            written,
            vec![dir.path().join("all.csv"), dir.path().join("all.jsonl")]
        );
        assert!(written.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn test_unwritable_target_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("missing-dir").join("bookmarks");

        let err = exporter(&[])
            .export(&[record("u", &[])], &stem, OutputFormat::Csv)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Csv { .. }));
    }

    #[test]
    fn test_csv_joins_multi_valued_fields() {
        let row = ExportRow::from_record(
            &BookmarkRecord {
                image_urls: vec!["a".to_string(), "b".to_string()],
                ..BookmarkRecord::default()
            },
            &ResolvedLinkMap::default(),
        );
        assert_eq!(row.csv_record()[5], "a | b");
        assert_eq!(row.csv_record()[8], "");
    }

    #[test]
    fn test_normalize_stem() {
        assert_eq!(normalize_stem("bookmarks.csv"), PathBuf::from("bookmarks"));
        assert_eq!(normalize_stem("out/bookmarks.jsonl"), PathBuf::from("out/bookmarks"));
        assert_eq!(normalize_stem("my.bookmarks"), PathBuf::from("my.bookmarks"));
        assert_eq!(
            with_extension(Path::new("my.bookmarks"), "csv"),
            PathBuf::from("my.bookmarks.csv")
        );
    }
}
