//! The item type shared across all feed sources.
//!
//! `RawItem` is what a source hands over before any cleanup: the description
//! still carries its markup and the publish date is the string the feed
//! provided.  [`crate::normalize`] turns these into deliverable entries.

/// A single feed item as read from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    /// Headline.  Items without one cannot be de-duplicated and are dropped
    /// during normalisation.
    pub title: Option<String>,

    /// URL to the full article; empty when the feed has none.
    pub link: String,

    /// Description or summary, possibly HTML.
    pub description_html: String,

    /// Publish date exactly as the feed wrote it.
    pub published: Option<String>,
}
