//! feed-relay — forwards new RSS/Atom items to chat webhooks.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ RawItem ┌──────────────┐ FeedEntry ┌───────────┐
//! │ source/   │ ──────► │ normalize.rs │ ────────► │ notify.rs │ ──► webhook
//! └───────────┘         └──────────────┘           └───────────┘
//!                              ▲ SeenSet                 │ outcome
//!                        ┌──────────┐               ┌──────────┐
//!                        │ store.rs │ ◄──────────── │ poll.rs  │
//!                        └──────────┘   save()      └──────────┘
//! ```
//!
//! * **`source/`** — the `DataSource` trait and the RSS / Atom sources.
//! * **`normalize`** — de-duplication against the seen set, markup cleanup,
//!   image extraction and chronological ordering.
//! * **`notify`** — webhook payloads, delivery and the delivery policy.
//! * **`store`** — one JSON file of seen entry keys per destination.
//! * **`destination`** / **`ident`** — the webhook list and derived keys.
//! * **`poll`** — the cycle / sleep loop tying it all together.
//! * **`main`** — parse args, load config, set up logging, run the loop.

mod config;
mod destination;
mod http;
mod ident;
mod logging;
mod normalize;
mod notify;
mod poll;
mod source;
mod store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{error, info};

use config::{Config, FeedFormat};
use logging::LogDestination;
use notify::WebhookNotifier;
use poll::Relay;
use source::{AtomSource, DataSource, RssSource};

fn main() -> Result<()> {
    // -- parse arguments -----------------------------------------------------
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    logging::initialize(match &config.log_file {
        Some(path) => LogDestination::TerminalAndFile(path.clone()),
        None => LogDestination::Terminal,
    });
    info!("Starting relay for {}", config.feed_url);

    // -- wire components -----------------------------------------------------
    let client = http::client(config.http_timeout()).context("building HTTP client")?;
    let source: Box<dyn DataSource> = match config.feed_format {
        FeedFormat::Rss => Box::new(RssSource::new(&config.feed_url, client.clone())),
        FeedFormat::Atom => Box::new(AtomSource::new(&config.feed_url, client.clone())),
    };
    let notifier = WebhookNotifier::new(client, config.branding.clone());

    // -- run until killed or the destination list breaks ---------------------
    let relay = Relay::new(&config, source, notifier);
    // Logged here only; returning the error would print it again.
    if let Err(err) = relay.run_forever() {
        error!("Fatal: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}
