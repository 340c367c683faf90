//! Stable identifiers for destinations and feed entries.
//!
//! Both keys are lowercase hex SHA-256 digests.  A [`DestinationKey`] names
//! the state file of one webhook/thread pair; an [`EntryKey`] is what gets
//! stored in that file once an item has been handled.
//!
//! Entry keys are derived from the title alone, so two distinct items that
//! share a title collapse into one.  Feeds we relay don't re-use titles in
//! practice, and hashing the title keeps state files written by earlier
//! deployments valid.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies the dedup state of one (endpoint, thread) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey(String);

/// Identifies one feed item by its trimmed title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl DestinationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the key for an endpoint and thread id.
///
/// The two parts are joined with `-` before hashing.
pub fn destination_key(endpoint: &str, thread_id: &str) -> DestinationKey {
    DestinationKey(sha256_hex(&format!("{endpoint}-{thread_id}")))
}

/// Derive the key for a feed item title.  Surrounding whitespace is ignored.
pub fn entry_key(title: &str) -> EntryKey {
    EntryKey(sha256_hex(title.trim()))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
