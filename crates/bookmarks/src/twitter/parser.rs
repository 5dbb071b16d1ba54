//! Tweet markup parser.
//!
//! Turns the rendered markup of one timeline item into a [`BookmarkRecord`].
//! Parsing is synchronous and works only on the snapshot; every field
//! degrades to empty on its own when X changes that part of the markup.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use url::Url;

use super::types::BookmarkRecord;
use crate::browser::ItemSnapshot;
use crate::site;

/// Errors produced while parsing a timeline item.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing extractable in the item at all.
    #[error("timeline item has no extractable content")]
    UnparseableItem,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static HANDLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[role="link"][href*="/"]"#));
static NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"div[data-testid="User-Name"] a span"#));
static TEXT: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[data-testid="tweetText"]"#));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static PHOTO: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"div[data-testid="tweetPhoto"] img"#));

static TEXT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>)]+"#).expect("static regex must compile"));
static SIZE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&?]name=\w+").expect("static regex must compile"));

/// Parser for rendered timeline items.
pub struct BookmarkParser;

impl BookmarkParser {
    /// Parse one timeline item.
    pub fn parse(item: &ItemSnapshot) -> Result<BookmarkRecord, ParseError> {
        let fragment = Html::parse_fragment(&item.html);
        let root = fragment.root_element();

        let handle = root
            .select(&HANDLE)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(handle_from_href)
            .unwrap_or_default();

        let author_name = root
            .select(&NAME)
            .next()
            .map(|el| inner_text(el).trim().to_string())
            .unwrap_or_default();

        let raw_text = root.select(&TEXT).next().map(inner_text).unwrap_or_default();

        let time = root.select(&TIME).next();
        let timestamp = time
            .and_then(|t| t.value().attr("datetime"))
            .unwrap_or_default()
            .to_string();
        // Permalink is the anchor wrapping the timestamp
        let item_url = time
            .and_then(enclosing_anchor_href)
            .and_then(site::absolutize)
            .unwrap_or_default();

        let (article_url, raw_links) = classify_links(root, &raw_text);
        let image_urls = photo_urls(root);

        let text = raw_text.replace('\n', " ").trim().to_string();

        if handle.is_empty()
            && text.is_empty()
            && timestamp.is_empty()
            && item_url.is_empty()
            && article_url.is_empty()
            && image_urls.is_empty()
            && raw_links.is_empty()
        {
            return Err(ParseError::UnparseableItem);
        }

        Ok(BookmarkRecord {
            timestamp,
            author_name,
            author_handle: if handle.is_empty() {
                String::new()
            } else {
                format!("@{handle}")
            },
            text,
            item_url,
            article_url,
            article_text: String::new(),
            image_urls,
            raw_links,
        })
    }
}

/// Rendered text of an element, approximating `innerText`.
///
/// Emoji are rendered by X as `<img alt="…">`, line breaks as `<br>`.
fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "img" => {
                if let Some(alt) = el.attr("alt") {
                    out.push_str(alt);
                }
            }
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

fn handle_from_href(href: &str) -> String {
    let path = if href.starts_with("http") {
        Url::parse(href)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    } else {
        href.to_string()
    };
    path.trim_matches('/').to_string()
}

fn enclosing_anchor_href(element: ElementRef<'_>) -> Option<&str> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

/// Split outbound links into the first X Article and the external link set.
fn classify_links(root: ElementRef<'_>, text: &str) -> (String, BTreeSet<String>) {
    let mut article_url = String::new();
    let mut raw_links: BTreeSet<String> = TEXT_URL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    for anchor in root.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").and_then(site::absolutize) else {
            continue;
        };
        if !href.starts_with("http") {
            continue;
        }
        if site::is_article_url(&href) {
            if article_url.is_empty() {
                article_url = href;
            }
        } else if site::is_short_link(&href) || !site::is_own_domain(&href) {
            raw_links.insert(href);
        }
    }

    raw_links.retain(|link| *link != article_url && !site::is_own_domain(link));
    (article_url, raw_links)
}

fn photo_urls(root: ElementRef<'_>) -> Vec<String> {
    root.select(&PHOTO)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| src.contains(site::MEDIA_PREFIX))
        .map(original_resolution)
        .collect()
}

/// Rewrite a media URL to request the original upload instead of a thumbnail.
fn original_resolution(src: &str) -> String {
    match Url::parse(src) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "name")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("name", "orig");
            url.to_string()
        }
        Err(_) => format!("{}?name=orig", SIZE_PARAM.replace_all(src, "")),
    }
}
