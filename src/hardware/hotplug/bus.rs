//! I2C presence probing and kernel driver (un)binding through sysfs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{HwError, Result};

/// Answers "is anything responding at this bus address right now".
#[async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn is_present(&self) -> Result<bool>;
}

/// Attaches and detaches the kernel driver for one device.
#[async_trait]
pub trait DriverBinding: Send + Sync {
    /// The device's sysfs directory. Its `hwmon` subdirectory exists only while a driver is bound.
    fn device_dir(&self) -> &Path;

    fn attributes_dir(&self) -> PathBuf {
        self.device_dir().join("hwmon")
    }

    async fn bind(&self) -> Result<()>;

    async fn unbind(&self) -> Result<()>;
}

/// Probes `/dev/i2c-<bus>` with a one-byte read at the device address.
pub struct I2cProbe {
    bus: u8,
    address: u8,
    dev_path: PathBuf,
}

impl I2cProbe {
    pub fn new(dev_root: &Path, bus: u8, address: u8) -> Self {
        Self {
            bus,
            address,
            dev_path: dev_root.join(format!("i2c-{}", bus)),
        }
    }
}

#[async_trait]
impl PresenceProbe for I2cProbe {
    async fn is_present(&self) -> Result<bool> {
        let (bus, address, path) = (self.bus, self.address, self.dev_path.clone());
        tokio::task::spawn_blocking(move || probe_blocking(&path, bus, address))
            .await
            .map_err(|e| HwError::Probe {
                bus,
                address,
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?
    }
}

#[cfg(target_os = "linux")]
fn probe_blocking(dev_path: &Path, bus: u8, address: u8) -> Result<bool> {
    use std::os::unix::io::AsRawFd;

    // linux/i2c-dev.h; FORCE because the bound driver already claims the address.
    const I2C_SLAVE_FORCE: libc::c_ulong = 0x0706;

    let probe_err = move |source: std::io::Error| HwError::Probe {
        bus,
        address,
        source,
    };

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(dev_path)
        .map_err(probe_err)?;
    let fd = file.as_raw_fd();

    if unsafe { libc::ioctl(fd, I2C_SLAVE_FORCE as _, libc::c_ulong::from(address)) } < 0 {
        return Err(probe_err(std::io::Error::last_os_error()));
    }

    let mut byte = 0u8;
    let n = unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
    if n >= 0 {
        return Ok(n == 1);
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        // NACK on the address: nothing plugged in
        Some(libc::ENXIO) | Some(libc::EREMOTEIO) | Some(libc::EIO) => Ok(false),
        _ => Err(probe_err(err)),
    }
}

#[cfg(not(target_os = "linux"))]
fn probe_blocking(_dev_path: &Path, bus: u8, address: u8) -> Result<bool> {
    Err(HwError::Probe {
        bus,
        address,
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "i2c probing requires Linux",
        ),
    })
}

/// Binds through `i2c-<bus>/new_device` and unbinds through `i2c-<bus>/delete_device`.
pub struct SysfsDriverBinding {
    driver: &'static str,
    address: u8,
    bus_dir: PathBuf,
    device_dir: PathBuf,
}

impl SysfsDriverBinding {
    pub fn new(devices_root: &Path, bus: u8, address: u8, driver: &'static str) -> Self {
        Self {
            driver,
            address,
            bus_dir: devices_root.join(format!("i2c-{}", bus)),
            device_dir: devices_root.join(format!("{}-{:04x}", bus, address)),
        }
    }

    async fn write(&self, file: &str, value: String) -> Result<()> {
        let path = self.bus_dir.join(file);
        debug!("Writing {:?} to {:?}", value, path);
        tokio::fs::write(&path, value)
            .await
            .map_err(|source| HwError::Write { path, source })
    }
}

#[async_trait]
impl DriverBinding for SysfsDriverBinding {
    fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    async fn bind(&self) -> Result<()> {
        self.write("new_device", format!("{} {:#04x}", self.driver, self.address))
            .await
    }

    async fn unbind(&self) -> Result<()> {
        self.write("delete_device", format!("{:#04x}", self.address))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binding_writes_registration_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("i2c-2")).unwrap();

        let binding = SysfsDriverBinding::new(root.path(), 2, 0x58, "ym2151e");
        assert_eq!(binding.device_dir(), root.path().join("2-0058").as_path());
        assert_eq!(binding.attributes_dir(), root.path().join("2-0058").join("hwmon"));

        binding.bind().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("i2c-2/new_device")).unwrap(),
            "ym2151e 0x58"
        );

        binding.unbind().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("i2c-2/delete_device")).unwrap(),
            "0x58"
        );
    }

    #[tokio::test]
    async fn binding_reports_missing_bus() {
        let root = tempfile::tempdir().unwrap();
        let binding = SysfsDriverBinding::new(root.path(), 7, 0x25, "yh5151e");
        assert!(matches!(binding.bind().await, Err(HwError::Write { .. })));
    }

    #[tokio::test]
    async fn probing_a_missing_adapter_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let probe = I2cProbe::new(root.path(), 3, 0x58);
        assert!(matches!(probe.is_present().await, Err(HwError::Probe { bus: 3, .. })));
    }
}
