//! Hardware data types: the flat state tree, poll results and side-loaded alarms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::hardware::thresholds::Thresholds;

/// Flat component-path -> value map. Ordered so serialized snapshots are stable.
pub type DataTree = BTreeMap<String, String>;

/// Thresholds keyed by the tree path of the sensor value they apply to.
pub type ThresholdsBySensorPath = BTreeMap<String, Thresholds<i64>>;

pub const COMPONENT_PREFIX: &str = "/hardware/component";
pub const LAST_CHANGE_KEY: &str = "/hardware/last-change";

pub const ALARM_SENSOR_MISSING: &str = "sensor-missing-alarm";
pub const ALARM_SENSOR_LOW_VALUE: &str = "sensor-low-value-alarm";
pub const ALARM_SENSOR_HIGH_VALUE: &str = "sensor-high-value-alarm";

pub const SEVERITY_CLEARED: &str = "cleared";
pub const SEVERITY_WARNING: &str = "warning";
pub const SEVERITY_CRITICAL: &str = "critical";

/// Tree path prefix of one component, e.g. `/hardware/component[name='ne:psu']`.
pub fn component_path(name: &str) -> String {
    format!("{}[name='{}']", COMPONENT_PREFIX, name)
}

/// Full tree key of one leaf below a component.
pub fn component_key(name: &str, leaf: &str) -> String {
    format!("{}/{}", component_path(name), leaf)
}

/// An alarm raised as a side effect of a poll. Routed to the alarm sink, never merged into the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SideLoadedAlarm {
    pub alarm_type: String,
    pub resource: String,
    pub severity: String,
    pub description: String,
}

impl SideLoadedAlarm {
    pub fn new(alarm_type: &str, resource: &str, severity: &str, description: &str) -> Self {
        Self {
            alarm_type: alarm_type.to_string(),
            resource: resource.to_string(),
            severity: severity.to_string(),
            description: description.to_string(),
        }
    }
}

/// Output of one data reader invocation, and of one whole aggregation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub data: DataTree,
    pub thresholds: ThresholdsBySensorPath,
    pub side_loaded_alarms: BTreeSet<SideLoadedAlarm>,
}

impl PollResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` into `self`. Keys present in both take the value from `other`:
    /// the later fragment wins. Collisions are not errors.
    pub fn merge(&mut self, other: PollResult) {
        self.data.extend(other.data);
        self.thresholds.extend(other.thresholds);
        self.side_loaded_alarms.extend(other.side_loaded_alarms);
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

impl From<DataTree> for PollResult {
    fn from(data: DataTree) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::thresholds::OneThreshold;

    #[test]
    fn component_keys_follow_path_convention() {
        assert_eq!(component_path("ne:psu"), "/hardware/component[name='ne:psu']");
        assert_eq!(
            component_key("ne:psu", "state/oper-state"),
            "/hardware/component[name='ne:psu']/state/oper-state"
        );
    }

    #[test]
    fn merge_overwrites_tree_and_thresholds() {
        let mut acc = PollResult::new();
        acc.insert("/a/x", "1");
        acc.thresholds.insert(
            "/a/x".to_string(),
            Thresholds { critical_low: Some(OneThreshold::new(0, 1)), ..Thresholds::default() },
        );

        let mut later = PollResult::new();
        later.insert("/a/x", "2");
        later.thresholds.insert(
            "/a/x".to_string(),
            Thresholds { critical_high: Some(OneThreshold::new(100, 5)), ..Thresholds::default() },
        );
        later.side_loaded_alarms.insert(SideLoadedAlarm::new(
            ALARM_SENSOR_MISSING,
            "/a",
            SEVERITY_CLEARED,
            "",
        ));

        acc.merge(later);
        assert_eq!(acc.data["/a/x"], "2");
        assert!(acc.thresholds["/a/x"].critical_low.is_none());
        assert_eq!(acc.thresholds["/a/x"].critical_high, Some(OneThreshold::new(100, 5)));
        assert_eq!(acc.side_loaded_alarms.len(), 1);
    }
}
