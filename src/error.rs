//! Error types for sysfs access, bus probing and device configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value {value:?} in {path:?}")]
    Parse { path: PathBuf, value: String },

    #[error("Failed to write to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe of i2c-{bus} address {address:#04x} failed: {source}")]
    Probe {
        bus: u8,
        address: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("No hwmon directory below {0:?}")]
    NoHwmon(PathBuf),

    #[error("Unknown device model '{0}'")]
    UnknownModel(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
