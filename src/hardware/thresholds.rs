//! Per-signal threshold configuration and the hysteresis watcher that turns a
//! stream of raw samples into discrete severity transitions.
//!
//! Entering an alarm needs a single strict violation of a boundary. Leaving it
//! is gated: while both the sample that triggered the current state and the new
//! sample lie inside `[boundary - hysteresis, boundary + hysteresis]`, the
//! alarm holds. This asymmetry is what keeps a sensor hovering at a boundary
//! from flapping.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// One boundary and the half-width of its hysteresis band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneThreshold<T> {
    pub value: T,
    pub hysteresis: T,
}

impl<T> OneThreshold<T>
where
    T: Copy + PartialOrd + Add<Output = T> + Sub<Output = T>,
{
    pub fn new(value: T, hysteresis: T) -> Self {
        Self { value, hysteresis }
    }

    fn within_band(&self, sample: T) -> bool {
        sample >= self.value - self.hysteresis && sample <= self.value + self.hysteresis
    }
}

/// Up to four boundaries. Expected (not enforced) ordering:
/// critical_low <= warning_low <= warning_high <= critical_high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_low: Option<OneThreshold<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_low: Option<OneThreshold<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_high: Option<OneThreshold<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<OneThreshold<T>>,
}

// Manual impl: derive would require `T: Default`.
impl<T> Default for Thresholds<T> {
    fn default() -> Self {
        Self {
            critical_low: None,
            warning_low: None,
            warning_high: None,
            critical_high: None,
        }
    }
}

impl<T> Thresholds<T> {
    pub fn is_empty(&self) -> bool {
        self.critical_low.is_none()
            && self.warning_low.is_none()
            && self.warning_high.is_none()
            && self.critical_high.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    Disabled,
    CriticalLow,
    WarningLow,
    Normal,
    WarningHigh,
    CriticalHigh,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Disabled => "disabled",
            Self::CriticalLow => "critical-low",
            Self::WarningLow => "warning-low",
            Self::Normal => "normal",
            Self::WarningHigh => "warning-high",
            Self::CriticalHigh => "critical-high",
        };
        f.write_str(name)
    }
}

/// A change of classification, reported by [`Watcher::update`] and [`Watcher::set_thresholds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<T> {
    pub previous: State,
    pub state: State,
    pub value: T,
    /// The boundary that was violated, if the new state is an alarm.
    pub boundary: Option<T>,
}

#[derive(Clone, Copy)]
enum Side {
    Low,
    High,
}

/// Hysteresis classifier for one signal. Not synchronized: one owner drives it.
#[derive(Debug, Clone)]
pub struct Watcher<T> {
    thresholds: Thresholds<T>,
    last_value: Option<T>,
    transition_value: Option<T>,
    state: State,
}

impl<T> Watcher<T>
where
    T: Copy + PartialOrd + Add<Output = T> + Sub<Output = T>,
{
    pub fn new(thresholds: Thresholds<T>) -> Self {
        Self {
            thresholds,
            last_value: None,
            transition_value: None,
            state: State::Initial,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn thresholds(&self) -> &Thresholds<T> {
        &self.thresholds
    }

    pub fn update(&mut self, value: T) -> Option<Transition<T>> {
        self.last_value = Some(value);
        self.evaluate(value)
    }

    /// Replace the thresholds, reset to `Initial` and re-evaluate the last sample (if any).
    pub fn set_thresholds(&mut self, thresholds: Thresholds<T>) -> Option<Transition<T>> {
        self.thresholds = thresholds;
        self.state = State::Initial;
        self.transition_value = None;
        self.last_value.and_then(|value| self.evaluate(value))
    }

    fn evaluate(&mut self, value: T) -> Option<Transition<T>> {
        let (state, boundary) = self.classify(value);
        if state == self.state {
            return None;
        }

        let previous = self.state;
        self.state = state;
        self.transition_value = Some(value);
        Some(Transition {
            previous,
            state,
            value,
            boundary,
        })
    }

    fn classify(&self, value: T) -> (State, Option<T>) {
        let t = &self.thresholds;
        let ordered = [
            (t.critical_low, Side::Low, State::CriticalLow),
            (t.critical_high, Side::High, State::CriticalHigh),
            (t.warning_low, Side::Low, State::WarningLow),
            (t.warning_high, Side::High, State::WarningHigh),
        ];

        for (threshold, side, alarm) in ordered {
            if let Some(threshold) = threshold {
                if self.violates(value, &threshold, side, alarm) {
                    return (alarm, Some(threshold.value));
                }
            }
        }

        if t.is_empty() {
            (State::Disabled, None)
        } else {
            (State::Normal, None)
        }
    }

    fn violates(&self, value: T, threshold: &OneThreshold<T>, side: Side, alarm: State) -> bool {
        let strict = match side {
            Side::Low => value < threshold.value,
            Side::High => value > threshold.value,
        };
        if strict {
            return true;
        }

        // Recovery out of this boundary's own alarm has to clear the band.
        self.state == alarm
            && self
                .transition_value
                .map_or(false, |trigger| threshold.within_band(trigger))
            && threshold.within_band(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states<T>(watcher: &mut Watcher<T>, samples: &[T]) -> Vec<State>
    where
        T: Copy + PartialOrd + Add<Output = T> + Sub<Output = T>,
    {
        samples
            .iter()
            .filter_map(|v| watcher.update(*v))
            .map(|t| t.state)
            .collect()
    }

    #[test]
    fn no_thresholds_is_disabled_once() {
        let mut watcher = Watcher::new(Thresholds::<i64>::default());
        assert_eq!(states(&mut watcher, &[1, -50, 0, 9999]), vec![State::Disabled]);
        assert_eq!(watcher.state(), State::Disabled);
    }

    #[test]
    fn critical_low_round_trip() {
        let mut watcher = Watcher::new(Thresholds {
            critical_low: Some(OneThreshold::new(0, 1)),
            ..Thresholds::default()
        });
        assert_eq!(
            states(&mut watcher, &[10, -10, 10]),
            vec![State::Normal, State::CriticalLow, State::Normal]
        );
    }

    #[test]
    fn warning_high_holds_inside_band() {
        let mut watcher = Watcher::new(Thresholds {
            warning_high: Some(OneThreshold::new(30.0, 2.0)),
            ..Thresholds::default()
        });
        assert_eq!(watcher.update(20.0).map(|t| t.state), Some(State::Normal));

        let entered = watcher.update(31.0).unwrap();
        assert_eq!(entered.state, State::WarningHigh);
        assert_eq!(entered.previous, State::Normal);
        assert_eq!(entered.boundary, Some(30.0));

        for sample in [28.0, 32.0, 29.5, 30.0, 28.0, 31.9] {
            assert_eq!(watcher.update(sample), None, "sample {}", sample);
        }
        assert_eq!(watcher.update(32.5), None);
        assert_eq!(watcher.update(27.9).map(|t| t.state), Some(State::Normal));
    }

    #[test]
    fn entry_needs_only_one_strict_violation() {
        let mut watcher = Watcher::new(Thresholds {
            warning_high: Some(OneThreshold::new(30, 2)),
            ..Thresholds::default()
        });
        watcher.update(29);
        assert_eq!(watcher.update(31).map(|t| t.state), Some(State::WarningHigh));
        // Exactly on the boundary is not a violation, but the band holds the alarm.
        assert_eq!(watcher.update(30), None);
    }

    #[test]
    fn recovery_is_immediate_when_trigger_was_outside_band() {
        let mut watcher = Watcher::new(Thresholds {
            warning_low: Some(OneThreshold::new(10, 2)),
            ..Thresholds::default()
        });
        watcher.update(20);
        assert_eq!(watcher.update(5).map(|t| t.state), Some(State::WarningLow));
        assert_eq!(watcher.update(11).map(|t| t.state), Some(State::Normal));
    }

    #[test]
    fn critical_takes_priority_over_warning() {
        let mut watcher = Watcher::new(Thresholds {
            critical_low: Some(OneThreshold::new(10, 1)),
            warning_low: Some(OneThreshold::new(20, 1)),
            warning_high: Some(OneThreshold::new(80, 1)),
            critical_high: Some(OneThreshold::new(90, 1)),
        });
        assert_eq!(
            states(&mut watcher, &[50, 15, 5, 15, 50, 85, 95, 85, 50]),
            vec![
                State::Normal,
                State::WarningLow,
                State::CriticalLow,
                State::WarningLow,
                State::Normal,
                State::WarningHigh,
                State::CriticalHigh,
                State::WarningHigh,
                State::Normal,
            ]
        );
    }

    #[test]
    fn critical_band_holds_before_falling_back_to_warning() {
        let mut watcher = Watcher::new(Thresholds {
            warning_high: Some(OneThreshold::new(80, 2)),
            critical_high: Some(OneThreshold::new(90, 2)),
            ..Thresholds::default()
        });
        watcher.update(50);
        assert_eq!(watcher.update(91).map(|t| t.state), Some(State::CriticalHigh));
        assert_eq!(watcher.update(89), None);
        assert_eq!(watcher.update(87).map(|t| t.state), Some(State::WarningHigh));
    }

    #[test]
    fn set_thresholds_reevaluates_last_sample() {
        let mut watcher = Watcher::new(Thresholds::<i64>::default());
        assert_eq!(watcher.update(100).map(|t| t.state), Some(State::Disabled));

        let transition = watcher.set_thresholds(Thresholds {
            critical_high: Some(OneThreshold::new(50, 5)),
            ..Thresholds::default()
        });
        assert_eq!(transition.map(|t| t.state), Some(State::CriticalHigh));
        assert_eq!(transition.map(|t| t.previous), Some(State::Initial));

        // Same thresholds again still resets, so the same class is reported again.
        let again = watcher.set_thresholds(*watcher.thresholds());
        assert_eq!(again.map(|t| t.state), Some(State::CriticalHigh));
    }

    #[test]
    fn set_thresholds_without_sample_stays_initial() {
        let mut watcher = Watcher::new(Thresholds::<i64>::default());
        assert_eq!(
            watcher.set_thresholds(Thresholds {
                warning_low: Some(OneThreshold::new(1, 0)),
                ..Thresholds::default()
            }),
            None
        );
        assert_eq!(watcher.state(), State::Initial);
    }
}
