//! Agent configuration structs and defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::hardware::hotplug::DEFAULT_PROBE_INTERVAL;
use crate::hardware::sysfs::SensorType;
use crate::hardware::thresholds::Thresholds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub hotplug: HotplugSettings,
    /// Static components. The chassis named by `agent.name` is added by
    /// [`AgentConfig::ensure_chassis`] when missing.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Name of the chassis component every other component hangs off.
    #[serde(default = "default_chassis")]
    pub name: String,
    /// Seconds between published snapshots.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotplugSettings {
    /// Seconds between presence probes of each hot-plug device.
    #[serde(default = "default_probe_interval")]
    pub probe_interval: f64,
    #[serde(default = "default_i2c_devices_root")]
    pub i2c_devices_root: PathBuf,
    #[serde(default = "default_dev_root")]
    pub dev_root: PathBuf,
    #[serde(default)]
    pub devices: Vec<HotplugDeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotplugDeviceConfig {
    pub name: String,
    pub model: String,
    pub bus: u8,
    /// 7-bit address, as a number or a hex string such as "0x58".
    #[serde(deserialize_with = "deserialize_address")]
    pub address: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub parent: String,
    pub kind: SensorType,
    /// Either a hwmon attribute directory or a device directory containing `hwmon/hwmon*`.
    pub hwmon_dir: PathBuf,
    pub channel: u32,
    #[serde(default)]
    pub thresholds: Option<Thresholds<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Where each snapshot is written as JSON. `null` disables the file.
    #[serde(default = "default_state_file")]
    pub state_file: Option<PathBuf>,
}

pub fn default_chassis() -> String { "ne".to_string() }
pub fn default_poll_interval() -> f64 { 10.0 }
pub fn default_log_level() -> String { "INFO".to_string() }
pub fn default_probe_interval() -> f64 { DEFAULT_PROBE_INTERVAL.as_secs_f64() }
pub fn default_i2c_devices_root() -> PathBuf { PathBuf::from("/sys/bus/i2c/devices") }
pub fn default_dev_root() -> PathBuf { PathBuf::from("/dev") }
pub fn default_state_file() -> Option<PathBuf> { Some(PathBuf::from("/run/pankha-hwstate/hardware-state.json")) }

pub const CHASSIS_CLASS: &str = "iana-hardware:chassis";

impl AgentConfig {
    /// Make sure the root component every hot-plug device hangs off exists.
    pub fn ensure_chassis(&mut self) {
        if self.components.iter().any(|c| c.name == self.agent.name) {
            return;
        }
        self.components.insert(
            0,
            ComponentConfig {
                name: self.agent.name.clone(),
                class: CHASSIS_CLASS.to_string(),
                parent: None,
                attributes: BTreeMap::new(),
            },
        );
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mut config = Self {
            agent: AgentSettings::default(),
            hotplug: HotplugSettings::default(),
            components: Vec::new(),
            sensors: Vec::new(),
            output: OutputSettings::default(),
        };
        config.ensure_chassis();
        config
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_chassis(),
            poll_interval: default_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

impl Default for HotplugSettings {
    fn default() -> Self {
        Self {
            probe_interval: default_probe_interval(),
            i2c_devices_root: default_i2c_devices_root(),
            dev_root: default_dev_root(),
            devices: Vec::new(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Address {
        Number(u8),
        Text(String),
    }

    match Address::deserialize(deserializer)? {
        Address::Number(n) => Ok(n),
        Address::Text(s) => {
            let digits = s.trim_start_matches("0x").trim_start_matches("0X");
            u8::from_str_radix(digits, 16)
                .map_err(|_| serde::de::Error::custom(format!("invalid i2c address '{}'", s)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let mut config: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.agent.name, "ne");
        assert_eq!(config.hotplug.probe_interval, DEFAULT_PROBE_INTERVAL.as_secs_f64());
        assert!(config.components.is_empty());

        config.ensure_chassis();
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.components[0].name, "ne");
        assert_eq!(config.components[0].class, CHASSIS_CLASS);
        assert!(config.sensors.is_empty());
        assert!(config.output.state_file.is_some());
    }

    #[test]
    fn devices_and_sensors_parse() {
        let config: AgentConfig = serde_json::from_str(
            r#"{
                "hotplug": {
                    "devices": [
                        { "name": "ne:psu1", "model": "ym2151e", "bus": 2, "address": "0x58" },
                        { "name": "ne:pdu", "model": "yh5151e", "bus": 2, "address": 37 }
                    ]
                },
                "sensors": [{
                    "name": "ne:ctrl:temperature-cpu",
                    "parent": "ne:ctrl",
                    "kind": "temperature",
                    "hwmon_dir": "/sys/class/hwmon/hwmon0",
                    "channel": 1,
                    "thresholds": { "critical_high": { "value": 85000, "hysteresis": 1000 } }
                }],
                "output": { "state_file": null }
            }"#,
        )
        .unwrap();

        assert_eq!(config.hotplug.devices[0].address, 0x58);
        assert_eq!(config.hotplug.devices[1].address, 37);
        assert_eq!(config.sensors[0].kind, SensorType::Temperature);
        let thresholds = config.sensors[0].thresholds.unwrap();
        assert_eq!(thresholds.critical_high.unwrap().value, 85000);
        assert!(thresholds.warning_low.is_none());
        assert!(config.output.state_file.is_none());
    }

    #[test]
    fn chassis_follows_agent_name() {
        let mut config: AgentConfig = serde_json::from_str(
            r#"{
                "agent": { "name": "lab-ne" },
                "components": [{ "name": "lab-ne:ctrl", "class": "iana-hardware:module", "parent": "lab-ne" }]
            }"#,
        )
        .unwrap();
        config.ensure_chassis();
        config.ensure_chassis();

        let names: Vec<&str> = config.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["lab-ne", "lab-ne:ctrl"]);
        assert!(config.components[0].parent.is_none());
    }

    #[test]
    fn configured_chassis_is_kept() {
        let mut config: AgentConfig = serde_json::from_str(
            r#"{ "components": [{ "name": "ne", "class": "iana-hardware:chassis", "attributes": { "mfg-name": "Pankha" } }] }"#,
        )
        .unwrap();
        config.ensure_chassis();
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.components[0].attributes["mfg-name"], "Pankha");
    }

    #[test]
    fn bad_address_is_rejected() {
        let res: Result<HotplugDeviceConfig, _> = serde_json::from_str(
            r#"{ "name": "x", "model": "ym2151e", "bus": 1, "address": "0xzz" }"#,
        );
        assert!(res.is_err());
    }
}
