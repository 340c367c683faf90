//! Process configuration.
//!
//! Every field has a default, so the relay runs without any config file at
//! all.  When a path is given on the command line, it must point to a JSON
//! document; fields it leaves out keep their defaults:
//!
//! ```json
//! {
//!   "feed_url": "https://example.com/feed.xml",
//!   "poll_interval_secs": 600,
//!   "branding": { "username": "News Bot" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::notify::DeliveryPolicy;

const LOGO_URL: &str = "https://www.logic-sunrise.com/forums/public/style_images/LSv4/logo.png";

/// Wire format of the feed at [`Config::feed_url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFormat {
    Rss,
    Atom,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed_url: String,
    pub feed_format: FeedFormat,
    /// Cleaned descriptions longer than this many characters are cut and
    /// suffixed with `...`.
    pub max_description_chars: usize,
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval_secs: u64,
    /// Directory holding one seen-set file per destination.
    pub state_dir: PathBuf,
    /// JSON file listing the webhooks to deliver to.
    pub webhooks_file: PathBuf,
    /// Timeout for feed fetches and webhook calls; `0` waits forever.
    pub http_timeout_secs: u64,
    pub delivery_policy: DeliveryPolicy,
    /// Also append log records to this file.
    pub log_file: Option<PathBuf>,
    pub branding: Branding,
}

/// Static presentation of every message the relay posts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub username: String,
    pub avatar_url: Option<String>,
    pub author_name: String,
    pub author_url: Option<String>,
    pub author_icon_url: Option<String>,
    /// Embed accent colour as `0xRRGGBB`.
    pub color: u32,
    pub footer: String,
    /// Plain text posted above the embed.
    pub lead_in: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://www.logic-sunrise.com/forums/rss/forums/1-news-fr/".into(),
            feed_format: FeedFormat::Rss,
            max_description_chars: 200,
            poll_interval_secs: 240,
            state_dir: PathBuf::from("sent_news"),
            webhooks_file: PathBuf::from("webhooks.json"),
            http_timeout_secs: 30,
            delivery_policy: DeliveryPolicy::default(),
            log_file: None,
            branding: Branding::default(),
        }
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            username: "Logic-Sunrise Bot".into(),
            avatar_url: Some(LOGO_URL.into()),
            author_name: "Logic-Sunrise".into(),
            author_url: Some("https://www.logic-sunrise.com".into()),
            author_icon_url: Some(LOGO_URL.into()),
            color: 0xFFA500,
            footer: "@ Logic-Sunrise • Powered by LS Bot".into(),
            lead_in: "🆕 Une nouvelle News Hack est dispo sur Logic-Sunrise:".into(),
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// `None` yields the defaults.  A path that cannot be read or parsed is
    /// an error: the caller asked for that file explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if config.feed_url.trim().is_empty() {
            anyhow::bail!("feed_url must not be empty");
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }
}
