//! Supported hot-pluggable power modules.
//!
//! Each model names its kernel driver, the sensors it exposes (in the order
//! they must be read) and what its absence means to the operator.

use crate::error::{HwError, Result};
use crate::hardware::sysfs::SensorType;
use crate::hardware::thresholds::{OneThreshold, Thresholds};

/// One hwmon channel of a power module, published as child component `<device>:<suffix>`.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub suffix: &'static str,
    pub sensor: SensorType,
    pub channel: u32,
    pub thresholds: Thresholds<i64>,
}

pub trait PowerDeviceModel: Send + Sync {
    fn model(&self) -> &'static str;

    /// Name accepted by the bus `new_device` file.
    fn driver(&self) -> &'static str;

    fn class(&self) -> &'static str {
        "iana-hardware:power-supply"
    }

    /// Severity of the sensor-missing alarm while this module is absent or unreadable.
    fn missing_severity(&self) -> &'static str;

    fn missing_description(&self) -> &'static str;

    /// Sensor channels in read order.
    fn channels(&self) -> Vec<Channel>;
}

pub fn model_for(name: &str) -> Result<Box<dyn PowerDeviceModel>> {
    match name {
        "ym2151e" => Ok(Box::new(Ym2151ePsu)),
        "yh5151e" => Ok(Box::new(Yh5151ePdu)),
        other => Err(HwError::UnknownModel(other.to_string())),
    }
}

fn band(
    critical_low: Option<i64>,
    warning_low: Option<i64>,
    warning_high: Option<i64>,
    critical_high: Option<i64>,
    hysteresis: i64,
) -> Thresholds<i64> {
    let one = |v: Option<i64>| v.map(|value| OneThreshold::new(value, hysteresis));
    Thresholds {
        critical_low: one(critical_low),
        warning_low: one(warning_low),
        warning_high: one(warning_high),
        critical_high: one(critical_high),
    }
}

fn channel(suffix: &'static str, sensor: SensorType, channel: u32, thresholds: Thresholds<i64>) -> Channel {
    Channel {
        suffix,
        sensor,
        channel,
        thresholds,
    }
}

/// Redundant 550 W PSU. Single PMBus page, so read order is free; we keep
/// input before output for readable logs.
pub struct Ym2151ePsu;

impl PowerDeviceModel for Ym2151ePsu {
    fn model(&self) -> &'static str {
        "ym2151e"
    }

    fn driver(&self) -> &'static str {
        "ym2151e"
    }

    fn missing_severity(&self) -> &'static str {
        "warning"
    }

    fn missing_description(&self) -> &'static str {
        "PSU is unplugged."
    }

    fn channels(&self) -> Vec<Channel> {
        use SensorType::*;
        vec![
            channel("voltage-in", Voltage, 1, band(Some(90_000), Some(100_000), Some(264_000), Some(270_000), 2_000)),
            channel("voltage-12V", Voltage, 2, band(Some(11_400), Some(11_700), Some(12_300), Some(12_600), 50)),
            channel("current-in", Current, 1, band(None, None, Some(5_000), Some(6_000), 100)),
            channel("current-12V", Current, 2, band(None, None, Some(40_000), Some(45_000), 500)),
            channel("power-in", Power, 1, band(None, None, Some(580_000_000), Some(620_000_000), 5_000_000)),
            channel("power-12V", Power, 2, band(None, None, Some(500_000_000), Some(550_000_000), 5_000_000)),
            channel("temperature-1", Temperature, 1, band(None, None, Some(60_000), Some(70_000), 1_000)),
            channel("temperature-2", Temperature, 2, band(None, None, Some(70_000), Some(80_000), 1_000)),
            channel("fan", Fan, 1, band(Some(500), Some(1_000), None, None, 100)),
        ]
    }
}

/// Power distribution unit with three output rails. Each rail lives on its own
/// PMBus page and every page switch is an extra bus transaction, so the readers
/// are grouped page by page: 12 V (page 0, which also carries the temperature
/// registers), then 5 V (page 1), then 3.3 V (page 2).
pub struct Yh5151ePdu;

impl PowerDeviceModel for Yh5151ePdu {
    fn model(&self) -> &'static str {
        "yh5151e"
    }

    fn driver(&self) -> &'static str {
        "yh5151e"
    }

    fn missing_severity(&self) -> &'static str {
        "critical"
    }

    fn missing_description(&self) -> &'static str {
        "PDU is unplugged."
    }

    fn channels(&self) -> Vec<Channel> {
        use SensorType::*;
        vec![
            // page 0
            channel("voltage-12V", Voltage, 1, band(Some(11_400), Some(11_700), Some(12_300), Some(12_600), 50)),
            channel("current-12V", Current, 1, band(None, None, Some(40_000), Some(45_000), 500)),
            channel("power-12V", Power, 1, band(None, None, Some(480_000_000), Some(540_000_000), 5_000_000)),
            channel("temperature-1", Temperature, 1, band(None, None, Some(60_000), Some(70_000), 1_000)),
            channel("temperature-2", Temperature, 2, band(None, None, Some(60_000), Some(70_000), 1_000)),
            channel("temperature-3", Temperature, 3, band(None, None, Some(60_000), Some(70_000), 1_000)),
            // page 1
            channel("voltage-5V", Voltage, 2, band(Some(4_750), Some(4_850), Some(5_150), Some(5_250), 20)),
            channel("current-5V", Current, 2, band(None, None, Some(15_000), Some(18_000), 200)),
            channel("power-5V", Power, 2, band(None, None, Some(75_000_000), Some(90_000_000), 1_000_000)),
            // page 2
            channel("voltage-3V3", Voltage, 3, band(Some(3_135), Some(3_200), Some(3_400), Some(3_465), 15)),
            channel("current-3V3", Current, 3, band(None, None, Some(15_000), Some(18_000), 200)),
            channel("power-3V3", Power, 3, band(None, None, Some(50_000_000), Some(60_000_000), 1_000_000)),
        ]
    }
}
