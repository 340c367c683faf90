//! Turns raw feed items into deliverable entries.
//!
//! For every item the normaliser:
//!
//! 1. derives the [`EntryKey`] from the trimmed title and drops the item if
//!    the destination has already seen it;
//! 2. strips the description down to plain text, one line, at most
//!    `max_chars` characters plus `...`;
//! 3. remembers the `src` of the first `<img>` in the description;
//! 4. parses the publish date.  Items whose date cannot be read are logged
//!    and dropped rather than failing the whole batch.
//!
//! Survivors are returned oldest first, so delivery order matches
//! publication order.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ego_tree::NodeRef;
use log::{debug, warn};
use scraper::node::Node;
use scraper::{Html, Selector};

use crate::ident::{self, EntryKey};
use crate::source::{DataSource, RawItem};
use crate::store::SeenSet;

/// Appended to descriptions that were cut short.
pub const ELLIPSIS: &str = "...";

/// Elements whose boundaries read as line breaks.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section",
    "table", "td", "th", "tr", "ul",
];

/// Elements whose text is never shown.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Layouts tried after RFC 2822 and RFC 3339, with an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Layouts without an offset; read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// A new item, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub key: EntryKey,
    pub link: String,
    /// Plain-text description, already truncated.
    pub description: String,
    pub image_url: Option<String>,
    /// Parsed publish time; only used for ordering.
    pub published: DateTime<Utc>,
    /// Publish date as the feed wrote it, for display.
    pub published_raw: String,
}

/// Fetch `source` and return the entries not yet in `seen`, oldest first.
///
/// A failed fetch is logged and yields no entries; the next cycle retries.
pub fn fetch_new_entries<S: DataSource + ?Sized>(
    source: &S,
    seen: &SeenSet,
    max_chars: usize,
) -> Vec<FeedEntry> {
    match source.fetch() {
        Ok(items) => new_entries(items, seen, max_chars),
        Err(err) => {
            warn!("Failed to fetch feed {}: {}", source.name(), err);
            Vec::new()
        }
    }
}

/// Filter and normalise already-fetched items.  No I/O.
pub fn new_entries(items: Vec<RawItem>, seen: &SeenSet, max_chars: usize) -> Vec<FeedEntry> {
    let mut batch: HashSet<EntryKey> = HashSet::new();
    let mut entries: Vec<FeedEntry> = items
        .into_iter()
        .filter_map(|item| {
            let entry = normalize_item(item, seen, max_chars)?;
            // The same title twice in one feed is delivered once.
            batch.insert(entry.key.clone()).then_some(entry)
        })
        .collect();

    // Stable: items published at the same instant keep feed order.
    entries.sort_by_key(|entry| entry.published);
    entries
}

fn normalize_item(item: RawItem, seen: &SeenSet, max_chars: usize) -> Option<FeedEntry> {
    let Some(title) = item
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        debug!("Skipping untitled item {:?}", item.link);
        return None;
    };

    let key = ident::entry_key(title);
    if seen.contains(&key) {
        return None;
    }

    let Some(published_raw) = item.published.as_deref().map(str::trim) else {
        warn!("Skipping {title:?}: no publish date");
        return None;
    };
    let Some(published) = parse_published(published_raw) else {
        warn!("Skipping {title:?}: unreadable publish date {published_raw:?}");
        return None;
    };

    Some(FeedEntry {
        title: title.to_string(),
        key,
        link: item.link.trim().to_string(),
        description: clean_description(&item.description_html, max_chars),
        image_url: first_image(&item.description_html),
        published,
        published_raw: published_raw.to_string(),
    })
}

/// Strip markup from `html`, fold it onto one line and cap its length.
pub fn clean_description(html: &str, max_chars: usize) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();
    for child in fragment.root_element().children() {
        collect_text(child, &mut text);
    }

    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate(&joined, max_chars)
}

/// URL of the first image embedded in `html`.
pub fn first_image(html: &str) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    let fragment = Html::parse_fragment(html);
    let src = fragment
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())?;
    Some(src.to_string())
}

/// Parse a feed date.  RFC 2822 is what RSS mandates; the other layouts
/// cover feeds that don't follow it.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            let name = element.name();
            if HIDDEN_ELEMENTS.contains(&name) {
                return;
            }
            let breaks = name == "br" || BLOCK_ELEMENTS.contains(&name);
            if breaks {
                out.push('\n');
            }
            for child in node.children() {
                collect_text(child, out);
            }
            if breaks {
                out.push('\n');
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
