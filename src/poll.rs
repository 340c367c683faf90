//! The poll loop.
//!
//! The relay alternates between two states.  While *cycling* it reads the
//! destination list and handles every destination in order: load its seen
//! set, fetch the feed, deliver what is new oldest first, persist the set.
//! Then it goes *idle* for the configured interval and starts over.  The
//! pause is measured from the end of a cycle, so the period drifts by however
//! long the cycle took.
//!
//! Everything runs on the calling thread.  The only error that leaves the
//! loop is an unreadable destination list; every other failure is logged
//! and the loop keeps going.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{error, info, warn};

use crate::config::Config;
use crate::destination::{self, Destination};
use crate::normalize;
use crate::notify::{DeliveryPolicy, Notifier};
use crate::source::DataSource;
use crate::store::{SeenStore, StoreError};

/// Counts for one destination in one cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DestinationReport {
    pub new_entries: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Counts for one full cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub skipped: usize,
    pub new_entries: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl CycleReport {
    fn absorb(&mut self, report: DestinationReport) {
        self.processed += 1;
        self.new_entries += report.new_entries;
        self.delivered += report.delivered;
        self.failed += report.failed;
    }
}

pub struct Relay<S, N> {
    source: S,
    notifier: N,
    store: SeenStore,
    webhooks_file: PathBuf,
    max_description_chars: usize,
    policy: DeliveryPolicy,
    poll_interval: Duration,
}

impl<S: DataSource, N: Notifier> Relay<S, N> {
    pub fn new(config: &Config, source: S, notifier: N) -> Self {
        Self {
            source,
            notifier,
            store: SeenStore::new(&config.state_dir),
            webhooks_file: config.webhooks_file.clone(),
            max_description_chars: config.max_description_chars,
            policy: config.delivery_policy,
            poll_interval: config.poll_interval(),
        }
    }

    /// Cycle, sleep, repeat.  Only returns when a cycle fails fatally.
    pub fn run_forever(&self) -> Result<()> {
        loop {
            let started = Instant::now();
            let report = self.run_cycle()?;
            info!(
                "Cycle done in {:.1?}: {} destinations, {} skipped, {} new, {} delivered, {} failed",
                started.elapsed(),
                report.processed,
                report.skipped,
                report.new_entries,
                report.delivered,
                report.failed
            );
            thread::sleep(self.poll_interval);
        }
    }

    /// One pass over every destination.
    ///
    /// Fails only when the destination list cannot be read.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let records = destination::load_destinations(&self.webhooks_file)?;
        let mut report = CycleReport::default();

        for record in &records {
            let Some(destination) = record.resolve() else {
                warn!("Invalid webhook configuration {:?}. Skipping.", record);
                report.skipped += 1;
                continue;
            };

            match self.process_destination(&destination) {
                Ok(destination_report) => report.absorb(destination_report),
                Err(err) => {
                    error!(
                        "Skipping webhook ID {} this cycle: {}",
                        destination.key(),
                        err
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Deliver everything `destination` has not seen yet and persist the
    /// updated seen set.
    ///
    /// A state file that cannot be read aborts before anything is sent, so
    /// a corrupt file never gets overwritten with a partial set.
    pub fn process_destination(
        &self,
        destination: &Destination,
    ) -> Result<DestinationReport, StoreError> {
        let key = destination.key();
        let mut seen = self.store.load(&key)?;

        let entries =
            normalize::fetch_new_entries(&self.source, &seen, self.max_description_chars);
        let mut report = DestinationReport {
            new_entries: entries.len(),
            ..DestinationReport::default()
        };

        if entries.is_empty() {
            info!("No new entries for webhook ID {key}.");
            return Ok(report);
        }
        info!("{} new entries found for webhook ID {key}.", entries.len());

        let mut marked = 0;
        for entry in &entries {
            let outcome = self.notifier.deliver(entry, destination);
            match &outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!("Failed to send {}: {}", entry.title, err);
                    report.failed += 1;
                }
            }
            if self.policy.should_mark_seen(&outcome) {
                seen.insert(entry.key.clone());
                marked += 1;
            }
        }

        if marked > 0 {
            self.store.save(&key, &seen)?;
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::fs;

    use tempfile::TempDir;

    use crate::ident::{self, EntryKey};
    use crate::normalize::FeedEntry;
    use crate::notify::DeliveryError;
    use crate::source::{RawItem, SourceError};

    const HOOK: &str = "https://hook.example/abc";

    struct FakeSource {
        items: RefCell<Vec<RawItem>>,
        fetches: Cell<usize>,
    }

    impl FakeSource {
        fn new(items: Vec<RawItem>) -> Self {
            Self {
                items: RefCell::new(items),
                fetches: Cell::new(0),
            }
        }
    }

    impl DataSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch(&self) -> Result<Vec<RawItem>, SourceError> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.items.borrow().clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn titles(&self) -> Vec<String> {
            self.sent.borrow().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn deliver(&self, entry: &FeedEntry, destination: &Destination) -> Result<(), DeliveryError> {
            self.sent
                .borrow_mut()
                .push((entry.title.clone(), destination.endpoint.clone()));
            if self.fail {
                Err(DeliveryError::Status { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    fn item(title: &str, published: &str) -> RawItem {
        RawItem {
            title: Some(title.into()),
            link: "https://example.com/news".into(),
            description_html: "<p>body</p>".into(),
            published: Some(published.into()),
        }
    }

    fn setup(webhooks: &str) -> (TempDir, Config) {
        crate::logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let config = Config {
            state_dir: temp.path().join("sent_news"),
            webhooks_file: temp.path().join("webhooks.json"),
            ..Config::default()
        };
        fs::write(&config.webhooks_file, webhooks).unwrap();
        (temp, config)
    }

    fn stored_keys(config: &Config, endpoint: &str, thread: &str) -> Vec<EntryKey> {
        let path = SeenStore::new(&config.state_dir).path_for(&ident::destination_key(endpoint, thread));
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn first_cycle_delivers_and_persists() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("Update 1.0", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(relay.notifier.titles(), vec!["Update 1.0"]);
        assert_eq!(relay.notifier.sent.borrow()[0].1, HOOK);
        assert_eq!(
            stored_keys(&config, HOOK, "default"),
            vec![ident::entry_key("Update 1.0")]
        );
    }

    #[test]
    fn second_cycle_on_unchanged_feed_sends_nothing() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![
                item("A", "Mon, 01 Jan 2024 00:00:00 +0000"),
                item("B", "Tue, 02 Jan 2024 00:00:00 +0000"),
            ]),
            RecordingNotifier::default(),
        );

        relay.run_cycle().unwrap();
        let second = relay.run_cycle().unwrap();

        assert_eq!(second.delivered, 0);
        assert_eq!(relay.notifier.titles(), vec!["A", "B"]);
    }

    #[test]
    fn delivers_in_chronological_order_skipping_seen() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let store = SeenStore::new(&config.state_dir);
        let seen = [ident::entry_key("B")].into_iter().collect();
        store
            .save(&ident::destination_key(HOOK, "default"), &seen)
            .unwrap();

        let relay = Relay::new(
            &config,
            FakeSource::new(vec![
                item("C", "Wed, 03 Jan 2024 00:00:00 +0000"),
                item("B", "Tue, 02 Jan 2024 00:00:00 +0000"),
                item("A", "Mon, 01 Jan 2024 00:00:00 +0000"),
            ]),
            RecordingNotifier::default(),
        );
        relay.run_cycle().unwrap();

        assert_eq!(relay.notifier.titles(), vec!["A", "C"]);
        assert_eq!(stored_keys(&config, HOOK, "default").len(), 3);
    }

    #[test]
    fn new_items_appearing_later_are_delivered() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        relay.run_cycle().unwrap();
        relay
            .source
            .items
            .borrow_mut()
            .push(item("B", "Tue, 02 Jan 2024 00:00:00 +0000"));
        relay.run_cycle().unwrap();

        assert_eq!(relay.notifier.titles(), vec!["A", "B"]);
    }

    #[test]
    fn each_destination_keeps_its_own_state() {
        let (_temp, config) = setup(
            r#"{ "webhooks": [
                { "url": "https://hook.example/abc" },
                { "url": "https://hook.example/abc", "thread_id": "7" }
            ] }"#,
        );
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.delivered, 2);
        // One fetch per destination.
        assert_eq!(relay.source.fetches.get(), 2);
        assert_eq!(stored_keys(&config, HOOK, "default").len(), 1);
        assert_eq!(stored_keys(&config, HOOK, "7").len(), 1);
    }

    #[test]
    fn invalid_records_are_skipped() {
        let (_temp, config) = setup(
            r#"{ "webhooks": [
                { "thread_id": "1" },
                { "url": "" },
                { "url": "https://hook.example/abc" }
            ] }"#,
        );
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.processed, 1);
        assert_eq!(relay.notifier.titles(), vec!["A"]);
    }

    #[test]
    fn wrongly_typed_record_does_not_block_its_neighbours() {
        let (_temp, config) = setup(
            r#"{ "webhooks": [
                { "url": 12345 },
                { "url": "https://hook.example/abc" }
            ] }"#,
        );
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(relay.notifier.titles(), vec!["A"]);
        assert_eq!(stored_keys(&config, HOOK, "default").len(), 1);
    }

    #[test]
    fn numeric_thread_id_is_routed_and_keyed_as_text() {
        let (_temp, config) = setup(
            r#"{ "webhooks": [ { "url": "https://hook.example/abc", "thread_id": 123 } ] }"#,
        );
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            stored_keys(&config, HOOK, "123"),
            vec![ident::entry_key("A")]
        );
    }

    #[test]
    fn missing_destination_list_is_fatal() {
        let (_temp, config) = setup("{}");
        fs::remove_file(&config.webhooks_file).unwrap();
        let relay = Relay::new(
            &config,
            FakeSource::new(Vec::new()),
            RecordingNotifier::default(),
        );

        assert!(relay.run_cycle().is_err());
        assert!(relay.run_forever().is_err());
        assert_eq!(relay.source.fetches.get(), 0);
    }

    #[test]
    fn malformed_destination_list_is_fatal() {
        let (_temp, config) = setup("[ broken");
        let relay = Relay::new(
            &config,
            FakeSource::new(Vec::new()),
            RecordingNotifier::default(),
        );
        assert!(relay.run_cycle().is_err());
    }

    #[test]
    fn failed_delivery_is_still_marked_by_default() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::failing(),
        );

        let first = relay.run_cycle().unwrap();
        let second = relay.run_cycle().unwrap();

        assert_eq!(first.failed, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(relay.notifier.titles(), vec!["A"]);
        assert_eq!(stored_keys(&config, HOOK, "default"), vec![ident::entry_key("A")]);
    }

    #[test]
    fn at_least_once_retries_failed_delivery() {
        let (_temp, mut config) =
            setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        config.delivery_policy = DeliveryPolicy::AtLeastOnce;
        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::failing(),
        );

        relay.run_cycle().unwrap();
        relay.run_cycle().unwrap();

        assert_eq!(relay.notifier.titles(), vec!["A", "A"]);
        assert!(!SeenStore::new(&config.state_dir)
            .path_for(&ident::destination_key(HOOK, "default"))
            .exists());
    }

    #[test]
    fn corrupt_state_skips_destination_without_overwriting() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let store = SeenStore::new(&config.state_dir);
        let path = store.path_for(&ident::destination_key(HOOK, "default"));
        fs::create_dir_all(&config.state_dir).unwrap();
        fs::write(&path, "not json").unwrap();

        let relay = Relay::new(
            &config,
            FakeSource::new(vec![item("A", "Mon, 01 Jan 2024 00:00:00 +0000")]),
            RecordingNotifier::default(),
        );
        let report = relay.run_cycle().unwrap();

        assert_eq!(report.skipped, 1);
        assert!(relay.notifier.titles().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn nothing_new_writes_no_state() {
        let (_temp, config) = setup(r#"{ "webhooks": [ { "url": "https://hook.example/abc" } ] }"#);
        let relay = Relay::new(&config, FakeSource::new(Vec::new()), RecordingNotifier::default());

        let report = relay.run_cycle().unwrap();

        assert_eq!(report.processed, 1);
        assert!(!config.state_dir.exists());
    }
}
