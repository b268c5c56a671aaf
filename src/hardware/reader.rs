//! The data-reader contract and its simple implementations.
//!
//! A reader is invoked once per poll and returns the tree fragment for one
//! component, plus optional thresholds and side-loaded alarms. Readers never
//! fail at this seam: each one catches its own I/O errors and degrades.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::hardware::sysfs::{HwmonAttributes, SensorType};
use crate::hardware::thresholds::Thresholds;
use crate::hardware::types::*;

#[async_trait]
pub trait DataReader: Send + Sync {
    async fn read(&self) -> PollResult;
}

#[async_trait]
impl<T: DataReader + ?Sized> DataReader for Arc<T> {
    async fn read(&self) -> PollResult {
        (**self).read().await
    }
}

/// A reader backed by a plain function.
pub struct FnReader<F>(F);

pub fn from_fn<F>(f: F) -> FnReader<F>
where
    F: Fn() -> PollResult + Send + Sync,
{
    FnReader(f)
}

#[async_trait]
impl<F> DataReader for FnReader<F>
where
    F: Fn() -> PollResult + Send + Sync,
{
    async fn read(&self) -> PollResult {
        (self.0)()
    }
}

/// Facts that never change while the agent runs (chassis, slots, model names).
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    data: DataTree,
}

impl StaticData {
    pub fn new(data: DataTree) -> Self {
        Self { data }
    }
}

/// Static reader for one component: `class`, optional `parent`, and any extra leaves.
pub fn component_facts<'a>(
    name: &str,
    class: &str,
    parent: Option<&str>,
    attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> StaticData {
    let mut data = DataTree::new();
    data.insert(component_key(name, "class"), class.to_string());
    if let Some(parent) = parent {
        data.insert(component_key(name, "parent"), parent.to_string());
    }
    for (leaf, value) in attributes {
        data.insert(component_key(name, leaf), value.to_string());
    }
    StaticData::new(data)
}

#[async_trait]
impl DataReader for StaticData {
    async fn read(&self) -> PollResult {
        PollResult::from(self.data.clone())
    }
}

/// One hwmon channel exposed as a sensor component.
#[derive(Debug, Clone)]
pub struct SysfsValue {
    component: String,
    parent: String,
    sensor: SensorType,
    channel: u32,
    hwmon: HwmonAttributes,
    thresholds: Option<Thresholds<i64>>,
}

impl SysfsValue {
    pub fn new(
        component: &str,
        parent: &str,
        sensor: SensorType,
        hwmon: HwmonAttributes,
        channel: u32,
    ) -> Self {
        Self {
            component: component.to_string(),
            parent: parent.to_string(),
            sensor,
            channel,
            hwmon,
            thresholds: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds<i64>) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn value_key(&self) -> String {
        component_key(&self.component, "sensor-data/value")
    }

    fn static_part(&self) -> DataTree {
        let mut data = DataTree::new();
        let key = |leaf: &str| component_key(&self.component, leaf);
        data.insert(key("class"), "iana-hardware:sensor".to_string());
        data.insert(key("parent"), self.parent.clone());
        data.insert(key("sensor-data/value-type"), self.sensor.value_type().to_string());
        data.insert(key("sensor-data/value-scale"), self.sensor.value_scale().to_string());
        data.insert(key("sensor-data/value-precision"), "0".to_string());
        data
    }

    /// Read the channel, propagating the failure. Composite readers use this so they
    /// can replace their whole sub-tree when any channel fails.
    pub async fn try_read(&self) -> Result<PollResult> {
        let value = self
            .hwmon
            .attribute(&self.sensor.input_attribute(self.channel))
            .await?;

        let mut res = PollResult::from(self.static_part());
        res.insert(self.value_key(), value.to_string());
        res.insert(
            component_key(&self.component, "sensor-data/oper-status"),
            "ok",
        );
        if let Some(thresholds) = self.thresholds {
            res.thresholds.insert(self.value_key(), thresholds);
        }
        Ok(res)
    }
}

#[async_trait]
impl DataReader for SysfsValue {
    async fn read(&self) -> PollResult {
        match self.try_read().await {
            Ok(res) => res,
            Err(e) => {
                warn!("Sensor {} unreadable: {}", self.component, e);
                let mut res = PollResult::from(self.static_part());
                res.insert(
                    component_key(&self.component, "sensor-data/oper-status"),
                    "nonoperational",
                );
                res
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::thresholds::OneThreshold;

    #[tokio::test]
    async fn static_facts_are_returned_verbatim() {
        let reader = component_facts("ne", "iana-hardware:chassis", None, [("mfg-name", "Pankha")]);
        let res = reader.read().await;
        assert_eq!(res.data.len(), 2);
        assert_eq!(res.data[&component_key("ne", "class")], "iana-hardware:chassis");
        assert_eq!(res.data[&component_key("ne", "mfg-name")], "Pankha");
        assert!(res.thresholds.is_empty());
    }

    #[tokio::test]
    async fn fn_reader_and_arc_delegate() {
        let reader: Arc<dyn DataReader> = Arc::new(from_fn(|| {
            let mut res = PollResult::new();
            res.insert("/a/x", "1");
            res
        }));
        assert_eq!(reader.read().await.data["/a/x"], "1");
    }

    #[tokio::test]
    async fn sysfs_value_reports_reading_and_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("temp2_input"), "48000\n").unwrap();
        let thresholds = Thresholds {
            critical_high: Some(OneThreshold::new(85_000, 1_000)),
            ..Thresholds::default()
        };

        let reader = SysfsValue::new(
            "ne:ctrl:temperature-cpu",
            "ne:ctrl",
            SensorType::Temperature,
            HwmonAttributes::new(dir.path()),
            2,
        )
        .with_thresholds(thresholds);

        let res = reader.read().await;
        let key = |leaf: &str| component_key("ne:ctrl:temperature-cpu", leaf);
        assert_eq!(res.data[&key("sensor-data/value")], "48000");
        assert_eq!(res.data[&key("sensor-data/oper-status")], "ok");
        assert_eq!(res.data[&key("sensor-data/value-type")], "celsius");
        assert_eq!(res.data[&key("sensor-data/value-scale")], "milli");
        assert_eq!(res.data[&key("parent")], "ne:ctrl");
        assert_eq!(res.thresholds[&reader.value_key()], thresholds);
    }

    #[tokio::test]
    async fn sysfs_value_degrades_on_missing_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let reader = SysfsValue::new(
            "ne:fans:fan1",
            "ne:fans",
            SensorType::Fan,
            HwmonAttributes::new(dir.path()),
            1,
        )
        .with_thresholds(Thresholds {
            critical_low: Some(OneThreshold::new(1000, 100)),
            ..Thresholds::default()
        });

        assert!(reader.try_read().await.is_err());

        let res = reader.read().await;
        assert!(!res.data.contains_key(&reader.value_key()));
        assert_eq!(
            res.data[&component_key("ne:fans:fan1", "sensor-data/oper-status")],
            "nonoperational"
        );
        assert!(res.thresholds.is_empty());
    }
}
