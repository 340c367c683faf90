//! RSS 2.0 feed source.
//!
//! Fetches the channel over HTTP and parses it with the [`rss`] crate.  The
//! parsing half is a pure function so tests never touch the network.

use reqwest::blocking::Client;

use super::{fetch_body, DataSource, RawItem, SourceError};

/// An RSS feed data source.
pub struct RssSource {
    /// The feed URL to poll.
    pub url: String,
    client: Client,
}

impl RssSource {
    /// Create a new RSS source.
    ///
    /// # Arguments
    ///
    /// * `url`: full URL of the RSS feed (e.g.
    ///   `https://www.logic-sunrise.com/forums/rss/forums/1-news-fr/`).
    /// * `client`: shared HTTP client, see [`crate::http::client`].
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Convert an already-fetched [`rss::Channel`] into [`RawItem`]s.
    pub fn parse_channel(channel: &rss::Channel) -> Vec<RawItem> {
        channel
            .items()
            .iter()
            .map(|item| RawItem {
                title: item.title().map(String::from),
                link: item.link().unwrap_or_default().to_string(),
                // Prefer <description>, fall back to <content:encoded>.
                description_html: item
                    .description()
                    .or_else(|| item.content())
                    .unwrap_or_default()
                    .to_string(),
                published: item.pub_date().map(String::from),
            })
            .collect()
    }
}

impl DataSource for RssSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<Vec<RawItem>, SourceError> {
        let body = fetch_body(&self.client, &self.url)?;
        let channel = rss::Channel::read_from(body.as_slice())?;
        Ok(Self::parse_channel(&channel))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
