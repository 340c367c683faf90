//! Atom feed source, parsed with [`feed_rs`].
//!
//! `feed_rs` hands back publish dates already parsed, so they are rendered
//! back into RFC 2822 to give every source the same raw-date shape.

use feed_rs::model::Entry;
use reqwest::blocking::Client;

use super::{fetch_body, DataSource, RawItem, SourceError};

/// An Atom feed data source.
///
/// Entries without a `<summary>` fall back to their `<content>` body; the
/// first `<link>` becomes the item link.
pub struct AtomSource {
    /// The feed URL to poll.
    pub url: String,
    client: Client,
}

impl AtomSource {
    /// Create a new Atom source.
    ///
    /// # Arguments
    ///
    /// * `url`: full URL of the Atom feed.
    /// * `client`: shared HTTP client, see [`crate::http::client`].
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Parse a raw Atom document into [`RawItem`]s.
    ///
    /// No I/O happens here; [`DataSource::fetch`] supplies the bytes.
    pub fn parse_feed(raw: &[u8]) -> Result<Vec<RawItem>, SourceError> {
        let feed = feed_rs::parser::parse(raw)?;
        Ok(feed.entries.iter().map(item_from_entry).collect())
    }
}

fn item_from_entry(entry: &Entry) -> RawItem {
    let description_html = entry
        .summary
        .as_ref()
        .map(|text| text.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    RawItem {
        title: entry.title.as_ref().map(|text| text.content.clone()),
        link: entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default(),
        description_html,
        published: entry
            .published
            .or(entry.updated)
            .map(|timestamp| timestamp.to_rfc2822()),
    }
}

impl DataSource for AtomSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<Vec<RawItem>, SourceError> {
        let body = fetch_body(&self.client, &self.url)?;
        Self::parse_feed(&body)
    }
}
