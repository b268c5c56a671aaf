//! Periodic publication of the hardware state.
//!
//! Each poll runs the aggregator, feeds every thresholded value into its
//! watcher, forwards alarms through the de-duplicating publisher and writes the
//! snapshot as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::alarms::{AlarmPublisher, AlarmSink};
use crate::hardware::aggregator::HardwareState;
use crate::hardware::thresholds::Watcher;
use crate::hardware::types::PollResult;

const VALUE_SUFFIX: &str = "/sensor-data/value";

pub struct Publisher<S> {
    state: HardwareState,
    watchers: BTreeMap<String, Watcher<i64>>,
    alarms: AlarmPublisher<S>,
    state_file: Option<PathBuf>,
}

impl<S: AlarmSink> Publisher<S> {
    pub fn new(state: HardwareState, sink: S, state_file: Option<PathBuf>) -> Self {
        Self {
            state,
            watchers: BTreeMap::new(),
            alarms: AlarmPublisher::new(sink),
            state_file,
        }
    }

    pub async fn poll_once(&mut self) -> Result<PollResult> {
        let snapshot = self.state.process().await;

        self.alarms.publish_side_loaded(&snapshot.side_loaded_alarms);
        self.evaluate_thresholds(&snapshot);

        if let Some(path) = &self.state_file {
            write_state_file(path, &snapshot).await?;
        }
        Ok(snapshot)
    }

    fn evaluate_thresholds(&mut self, snapshot: &PollResult) {
        // Signals that stopped reporting thresholds take their watcher and alarms with them.
        let gone: Vec<String> = self
            .watchers
            .keys()
            .filter(|key| !snapshot.thresholds.contains_key(*key))
            .cloned()
            .collect();
        for key in gone {
            debug!("Dropping threshold watcher for {}", key);
            self.watchers.remove(&key);
            self.alarms.clear_value_alarms(resource_of(&key));
        }

        for (key, thresholds) in &snapshot.thresholds {
            let resource = resource_of(key);
            let watcher = self
                .watchers
                .entry(key.clone())
                .or_insert_with(|| Watcher::new(*thresholds));

            if watcher.thresholds() != thresholds {
                debug!("Thresholds of {} changed", key);
                if let Some(transition) = watcher.set_thresholds(*thresholds) {
                    self.alarms.publish_transition(resource, &transition);
                }
            }

            let Some(raw) = snapshot.data.get(key) else {
                continue;
            };
            match raw.parse::<i64>() {
                Ok(value) => {
                    if let Some(transition) = watcher.update(value) {
                        debug!("{}: {} -> {}", key, transition.previous, transition.state);
                        self.alarms.publish_transition(resource, &transition);
                    }
                }
                Err(_) => warn!("{}: value {:?} is not an integer, skipping thresholds", key, raw),
            }
        }
    }

    /// Poll forever at `interval`. Poll errors are logged and the loop continues.
    pub async fn run(&mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!("Failed to publish hardware state: {:#}", e);
            }
        }
    }
}

fn resource_of(value_key: &str) -> &str {
    value_key.strip_suffix(VALUE_SUFFIX).unwrap_or(value_key)
}

/// Replace `path` atomically so readers never see a half-written file.
pub async fn write_state_file(path: &Path, snapshot: &PollResult) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move state file into {:?}", path))?;
    Ok(())
}
