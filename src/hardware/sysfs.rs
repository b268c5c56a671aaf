//! hwmon attribute directory access.
//!
//! Every attribute is a file holding one decimal integer. A missing file or
//! content that does not parse is a read failure; callers decide how to degrade.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{HwError, Result};

/// Signal class of one hwmon channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Fan,
    Voltage,
    Current,
    Power,
}

impl SensorType {
    /// Attribute filename prefix (`temp1_input`, `in2_input`, ...).
    pub fn hwmon_prefix(&self) -> &'static str {
        match self {
            Self::Temperature => "temp",
            Self::Fan => "fan",
            Self::Voltage => "in",
            Self::Current => "curr",
            Self::Power => "power",
        }
    }

    pub fn input_attribute(&self, channel: u32) -> String {
        format!("{}{}_input", self.hwmon_prefix(), channel)
    }

    pub fn value_type(&self) -> &'static str {
        match self {
            Self::Temperature => "celsius",
            Self::Fan => "rpm",
            Self::Voltage => "volts-DC",
            Self::Current => "amperes",
            Self::Power => "watts",
        }
    }

    /// Scale of the raw integer, as hwmon reports it.
    pub fn value_scale(&self) -> &'static str {
        match self {
            Self::Temperature | Self::Voltage | Self::Current => "milli",
            Self::Fan => "units",
            Self::Power => "micro",
        }
    }
}

/// One hwmon directory (`.../hwmon/hwmonN`).
#[derive(Debug, Clone)]
pub struct HwmonAttributes {
    root: PathBuf,
}

impl HwmonAttributes {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the single `hwmon*` entry below `device_dir/hwmon`. The kernel numbers
    /// these dynamically, so the name changes on every bind.
    pub fn resolve(device_dir: &Path) -> Result<Self> {
        let pattern = device_dir.join("hwmon").join("hwmon*");
        let pattern_str = pattern.to_string_lossy();

        let found = glob::glob(&pattern_str)
            .map_err(|_| HwError::NoHwmon(device_dir.to_path_buf()))?
            .filter_map(std::result::Result::ok)
            .find(|p| p.is_dir())
            .ok_or_else(|| HwError::NoHwmon(device_dir.to_path_buf()))?;

        Ok(Self::new(found))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn attribute(&self, name: &str) -> Result<i64> {
        let path = self.root.join(name);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| HwError::Read {
                path: path.clone(),
                source,
            })?;

        let trimmed = raw.trim();
        trace!("{:?} = {}", path, trimmed);
        trimmed.parse::<i64>().map_err(|_| HwError::Parse {
            path,
            value: trimmed.to_string(),
        })
    }
}
