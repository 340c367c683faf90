//! Feed source abstraction layer.
//!
//! This module defines the [`DataSource`] trait and the [`RawItem`] type that
//! every source produces.  Concrete implementations live in sub-modules:
//! [`RssSource`] for RSS 2.0 and [`AtomSource`] for Atom.
//!
//! ## For contributors — adding a new source
//!
//! 1. Create a new file in this directory (e.g. `json_feed.rs`).
//! 2. Define a struct and implement [`DataSource`] for it.
//! 3. Add `mod json_feed;` below and re-export your struct.
//! 4. Add a [`FeedFormat`](crate::config::FeedFormat) variant and construct
//!    the source in `main.rs`.
//!
//! Sources only fetch and parse.  Markup cleanup, de-duplication and
//! ordering happen in [`crate::normalize`] so they behave the same for every
//! format.

mod atom;
mod feed_item;
mod rss;

pub use atom::AtomSource;
pub use feed_item::RawItem;
pub use rss::RssSource;

use reqwest::blocking::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("rss parse error: {0}")]
    Rss(#[from] ::rss::Error),
    #[error("atom parse error: {0}")]
    Atom(#[from] feed_rs::parser::ParseFeedError),
}

/// Trait that every feed source must implement.
///
/// The relay calls [`fetch()`](DataSource::fetch) once per destination per
/// cycle.  A failed fetch is logged and skipped; the next cycle retries.
pub trait DataSource {
    /// Human-readable label used in log messages.
    fn name(&self) -> &str;

    /// Fetch the feed and return its items in document order.
    fn fetch(&self) -> Result<Vec<RawItem>, SourceError>;
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self) -> Result<Vec<RawItem>, SourceError> {
        (**self).fetch()
    }
}

/// GET `url` and return the body of a 2xx response.
fn fetch_body(client: &Client, url: &str) -> Result<Vec<u8>, SourceError> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus(status.as_u16()));
    }
    Ok(response.bytes()?.to_vec())
}
