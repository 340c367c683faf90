//! Webhook destinations.
//!
//! The destination list is a JSON document of the form
//!
//! ```json
//! { "webhooks": [ { "url": "https://discord.com/api/webhooks/…", "thread_id": "123" } ] }
//! ```
//!
//! It is re-read at the start of every cycle.  Only the outer document has
//! to be well formed; each record is checked on its own, so one bad entry
//! does not take the others down with it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::ident::{self, DestinationKey};

/// Thread id used for key derivation when none is configured.
pub const DEFAULT_THREAD_ID: &str = "default";

#[derive(Debug, Default, Deserialize)]
struct DestinationList {
    #[serde(default)]
    webhooks: Vec<DestinationRecord>,
}

/// One entry of the destination list, as written by the operator.
///
/// Kept as raw JSON until [`DestinationRecord::resolve`] so that a record of
/// the wrong shape can be skipped instead of failing the whole list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DestinationRecord(Value);

impl From<Value> for DestinationRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A validated webhook endpoint, optionally routed to a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub endpoint: String,
    pub thread_id: Option<String>,
}

impl DestinationRecord {
    /// `None` when the record is not an object, has no usable `url`, or has
    /// a `thread_id` that is neither a string nor a number.
    ///
    /// Numeric thread ids are taken as their decimal text, so `123` and
    /// `"123"` name the same destination.
    pub fn resolve(&self) -> Option<Destination> {
        let endpoint = match self.0.get("url")? {
            Value::String(url) => url.trim(),
            _ => return None,
        };
        if endpoint.is_empty() {
            return None;
        }

        let thread_id = match self.0.get("thread_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.trim().to_string()).filter(|t| !t.is_empty()),
            Some(Value::Number(id)) => Some(id.to_string()),
            Some(_) => return None,
        };

        Some(Destination {
            endpoint: endpoint.to_string(),
            thread_id,
        })
    }
}

impl Destination {
    pub fn key(&self) -> DestinationKey {
        ident::destination_key(
            &self.endpoint,
            self.thread_id.as_deref().unwrap_or(DEFAULT_THREAD_ID),
        )
    }
}

/// Read the destination list.  A missing or malformed file is an error.
pub fn load_destinations(path: &Path) -> Result<Vec<DestinationRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("destination list {} not found or unreadable", path.display()))?;
    let list: DestinationList = serde_json::from_str(&text)
        .with_context(|| format!("destination list {} is not valid JSON", path.display()))?;
    Ok(list.webhooks)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
