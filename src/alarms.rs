//! Alarm forwarding with de-duplication.
//!
//! Readers re-raise their alarms on every poll so the sink always knows the
//! resource exists. The publisher only forwards an alarm when its severity
//! differs from what was last forwarded for the same (type, qualifier, resource).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{info, warn};

use crate::hardware::thresholds::{State, Transition};
use crate::hardware::types::*;

pub trait AlarmSink: Send + Sync {
    fn raise(
        &self,
        alarm_type: &str,
        qualifier: Option<&str>,
        resource: &str,
        severity: &str,
        text: &str,
    );
}

impl<S: AlarmSink + ?Sized> AlarmSink for &S {
    fn raise(&self, alarm_type: &str, qualifier: Option<&str>, resource: &str, severity: &str, text: &str) {
        (**self).raise(alarm_type, qualifier, resource, severity, text)
    }
}

impl<S: AlarmSink + ?Sized> AlarmSink for Arc<S> {
    fn raise(&self, alarm_type: &str, qualifier: Option<&str>, resource: &str, severity: &str, text: &str) {
        (**self).raise(alarm_type, qualifier, resource, severity, text)
    }
}

/// Writes alarms to the agent log.
pub struct TracingAlarmSink;

impl AlarmSink for TracingAlarmSink {
    fn raise(&self, alarm_type: &str, qualifier: Option<&str>, resource: &str, severity: &str, text: &str) {
        let alarm = match qualifier {
            Some(q) => format!("{}[{}]", alarm_type, q),
            None => alarm_type.to_string(),
        };
        if severity == SEVERITY_CLEARED {
            info!("Alarm {} on {} cleared", alarm, resource);
        } else {
            warn!("Alarm {} on {}: {} ({})", alarm, resource, severity, text);
        }
    }
}

type AlarmKey = (String, Option<String>, String);

pub struct AlarmPublisher<S> {
    sink: S,
    last: HashMap<AlarmKey, String>,
}

impl<S: AlarmSink> AlarmPublisher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            last: HashMap::new(),
        }
    }

    /// Forward one alarm unless it repeats the last forwarded severity. Returns whether it was forwarded.
    pub fn publish(
        &mut self,
        alarm_type: &str,
        qualifier: Option<&str>,
        resource: &str,
        severity: &str,
        text: &str,
    ) -> bool {
        let key = (
            alarm_type.to_string(),
            qualifier.map(str::to_string),
            resource.to_string(),
        );
        if self.last.get(&key).map(String::as_str) == Some(severity) {
            return false;
        }

        self.sink.raise(alarm_type, qualifier, resource, severity, text);
        self.last.insert(key, severity.to_string());
        true
    }

    pub fn publish_side_loaded(&mut self, alarms: &BTreeSet<SideLoadedAlarm>) {
        for alarm in alarms {
            self.publish(
                &alarm.alarm_type,
                None,
                &alarm.resource,
                &alarm.severity,
                &alarm.description,
            );
        }
    }

    /// Map a watcher transition onto the low/high value alarms of `resource`.
    pub fn publish_transition(&mut self, resource: &str, transition: &Transition<i64>) {
        let (low, high) = match transition.state {
            State::Initial => return,
            State::CriticalLow => (SEVERITY_CRITICAL, SEVERITY_CLEARED),
            State::WarningLow => (SEVERITY_WARNING, SEVERITY_CLEARED),
            State::Normal | State::Disabled => (SEVERITY_CLEARED, SEVERITY_CLEARED),
            State::WarningHigh => (SEVERITY_CLEARED, SEVERITY_WARNING),
            State::CriticalHigh => (SEVERITY_CLEARED, SEVERITY_CRITICAL),
        };

        let text = match transition.boundary {
            Some(boundary) => format!(
                "Sensor value {} crossed threshold {} ({})",
                transition.value, boundary, transition.state
            ),
            None => format!("Sensor value {} is {}", transition.value, transition.state),
        };

        self.publish(ALARM_SENSOR_LOW_VALUE, None, resource, low, &text);
        self.publish(ALARM_SENSOR_HIGH_VALUE, None, resource, high, &text);
    }

    /// Clear the value alarms of a sensor that disappeared.
    pub fn clear_value_alarms(&mut self, resource: &str) {
        for alarm_type in [ALARM_SENSOR_LOW_VALUE, ALARM_SENSOR_HIGH_VALUE] {
            let key = (alarm_type.to_string(), None, resource.to_string());
            if self.last.contains_key(&key) {
                self.publish(alarm_type, None, resource, SEVERITY_CLEARED, "Sensor removed");
            }
        }
    }
}
