//! Hardware state aggregator: an ordered registry of data readers merged into
//! one snapshot per poll.

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::hardware::reader::DataReader;
use crate::hardware::types::*;

/// Readers run in registration order and their fragments are folded left to
/// right with [`PollResult::merge`], so on a key collision the reader
/// registered last wins.
#[derive(Default)]
pub struct HardwareState {
    readers: Vec<Box<dyn DataReader>>,
}

impl HardwareState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_reader(&mut self, reader: impl DataReader + 'static) {
        self.readers.push(Box::new(reader));
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Run every reader once and merge the results. The tree gets a fresh
    /// `LAST_CHANGE_KEY` timestamp; thresholds and side-loaded alarms are
    /// returned next to it, never inside it.
    pub async fn process(&self) -> PollResult {
        let mut snapshot = PollResult::new();
        for reader in &self.readers {
            snapshot.merge(reader.read().await);
        }

        snapshot.insert(
            LAST_CHANGE_KEY,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        debug!(
            "Hardware poll: {} readers, {} keys, {} thresholds, {} side-loaded alarms",
            self.readers.len(),
            snapshot.data.len(),
            snapshot.thresholds.len(),
            snapshot.side_loaded_alarms.len()
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::reader::from_fn;

    fn fragment(entries: &[(&str, &str)]) -> PollResult {
        let mut res = PollResult::new();
        for (k, v) in entries {
            res.insert(*k, *v);
        }
        res
    }

    #[tokio::test]
    async fn later_reader_wins_collisions() {
        let mut state = HardwareState::new();
        state.register_reader(from_fn(|| fragment(&[("/a/x", "1")])));
        state.register_reader(from_fn(|| fragment(&[("/a/x", "2"), ("/a/y", "3")])));

        let snapshot = state.process().await;
        assert_eq!(snapshot.data["/a/x"], "2");
        assert_eq!(snapshot.data["/a/y"], "3");
        assert!(snapshot.data.contains_key(LAST_CHANGE_KEY));
        assert_eq!(snapshot.data.len(), 3);
    }

    #[tokio::test]
    async fn output_is_reproducible_apart_from_timestamp() {
        let mut state = HardwareState::new();
        state.register_reader(from_fn(|| fragment(&[("/b", "2"), ("/a", "1")])));
        state.register_reader(from_fn(|| {
            let mut res = fragment(&[("/c", "3")]);
            res.side_loaded_alarms.insert(SideLoadedAlarm::new(
                ALARM_SENSOR_MISSING,
                "/c",
                SEVERITY_CLEARED,
                "",
            ));
            res
        }));

        let strip = |mut res: PollResult| {
            res.data.remove(LAST_CHANGE_KEY);
            serde_json::to_string(&res).unwrap()
        };
        let first = strip(state.process().await);
        let second = strip(state.process().await);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_registry_yields_only_timestamp() {
        let state = HardwareState::new();
        let snapshot = state.process().await;
        assert_eq!(snapshot.data.len(), 1);
        assert!(snapshot.side_loaded_alarms.is_empty());
    }
}
