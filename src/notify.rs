//! Webhook delivery.
//!
//! Each new entry becomes one message: a short lead-in line plus a single
//! rich embed in the Discord webhook format.  Delivery is synchronous, one
//! HTTP call per entry.
//!
//! Whether a failed delivery still counts as handled is decided by
//! [`DeliveryPolicy`], not by the notifier.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Branding;
use crate::destination::Destination;
use crate::normalize::FeedEntry;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook answered {status}")]
    Status { status: u16 },
}

/// Sends entries somewhere.
pub trait Notifier {
    fn deliver(&self, entry: &FeedEntry, destination: &Destination) -> Result<(), DeliveryError>;
}

/// When an entry counts as handled for a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Mark every attempted entry as seen, delivered or not.  Failed entries
    /// are never retried.
    #[default]
    AtMostOnce,
    /// Mark only entries the webhook accepted; failures are retried next
    /// cycle and may be posted twice if the webhook lied about failing.
    AtLeastOnce,
}

impl DeliveryPolicy {
    pub fn should_mark_seen(self, outcome: &Result<(), DeliveryError>) -> bool {
        match self {
            Self::AtMostOnce => true,
            Self::AtLeastOnce => outcome.is_ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message body, Discord webhook format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<&'a str>,
    pub embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Embed<'a> {
    pub title: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub url: &'a str,
    pub color: u32,
    pub author: EmbedAuthor<'a>,
    pub fields: Vec<EmbedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage<'a>>,
    pub footer: EmbedFooter<'a>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedAuthor<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct EmbedField<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter<'a> {
    pub text: &'a str,
}

/// Build the message for `entry`.  `now` becomes the embed timestamp.
pub fn build_payload<'a>(
    entry: &'a FeedEntry,
    branding: &'a Branding,
    now: DateTime<Utc>,
) -> WebhookPayload<'a> {
    let embed = Embed {
        title: &entry.title,
        description: &entry.description,
        url: &entry.link,
        color: branding.color,
        author: EmbedAuthor {
            name: &branding.author_name,
            url: branding.author_url.as_deref(),
            icon_url: branding.author_icon_url.as_deref(),
        },
        fields: vec![EmbedField {
            name: "Date",
            value: &entry.published_raw,
            inline: false,
        }],
        image: entry.image_url.as_deref().map(|url| EmbedImage { url }),
        footer: EmbedFooter {
            text: &branding.footer,
        },
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    WebhookPayload {
        content: &branding.lead_in,
        username: &branding.username,
        avatar_url: branding.avatar_url.as_deref(),
        embeds: vec![embed],
    }
}

// ---------------------------------------------------------------------------
// HTTP delivery
// ---------------------------------------------------------------------------

/// Posts entries to Discord-compatible webhooks.
pub struct WebhookNotifier {
    client: Client,
    branding: Branding,
}

impl WebhookNotifier {
    pub fn new(client: Client, branding: Branding) -> Self {
        Self { client, branding }
    }

    /// The HTTP request that delivers `entry`, routed to the destination's
    /// thread when one is configured.
    pub fn request(
        &self,
        entry: &FeedEntry,
        destination: &Destination,
        now: DateTime<Utc>,
    ) -> reqwest::Result<Request> {
        let mut builder = self
            .client
            .post(&destination.endpoint)
            .json(&build_payload(entry, &self.branding, now));
        if let Some(thread_id) = &destination.thread_id {
            builder = builder.query(&[("thread_id", thread_id)]);
        }
        builder.build()
    }
}

impl Notifier for WebhookNotifier {
    fn deliver(&self, entry: &FeedEntry, destination: &Destination) -> Result<(), DeliveryError> {
        let request = self.request(entry, destination, Utc::now())?;
        let status = self.client.execute(request)?.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
