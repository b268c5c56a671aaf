//! Hardware state: readers, the aggregator that merges them, threshold
//! watchers and the hot-plug power device manager.

pub mod aggregator;
pub mod hotplug;
pub mod reader;
pub mod sysfs;
pub mod thresholds;
pub mod types;

pub use aggregator::HardwareState;
pub use hotplug::PowerDevice;
pub use reader::{component_facts, from_fn, DataReader, StaticData, SysfsValue};
pub use thresholds::{OneThreshold, State, Thresholds, Transition, Watcher};
pub use types::{DataTree, PollResult, SideLoadedAlarm};
