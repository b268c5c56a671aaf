//! Hot-pluggable power device manager.
//!
//! A background task probes the bus every `probe_interval`. When the module
//! appears, the kernel driver is bound and a fresh set of sensor readers is
//! built; when it disappears the driver is unbound and the readers dropped.
//! The composite read path and the probe path share one mutex, and a read that
//! fails while the device is believed present wakes the probe task early.

pub mod bus;
pub mod models;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::hardware::reader::{DataReader, SysfsValue};
use crate::hardware::sysfs::HwmonAttributes;
use crate::hardware::types::*;

use bus::{DriverBinding, I2cProbe, PresenceProbe, SysfsDriverBinding};
use models::PowerDeviceModel;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(3);

struct DeviceState {
    bound: bool,
    readers: Vec<SysfsValue>,
    static_data: DataTree,
    /// Incremented every time the reader set is rebuilt.
    generation: u64,
}

pub struct PowerDevice {
    name: String,
    model: Box<dyn PowerDeviceModel>,
    probe: Box<dyn PresenceProbe>,
    binding: Box<dyn DriverBinding>,
    probe_interval: Duration,
    state: Mutex<DeviceState>,
    wake: Notify,
    exit: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PowerDevice {
    /// Build the device and run one probe immediately, so the first poll does not
    /// report a present module as missing. A failing probe aborts construction.
    pub async fn new(
        name: &str,
        parent: &str,
        model: Box<dyn PowerDeviceModel>,
        probe: Box<dyn PresenceProbe>,
        binding: Box<dyn DriverBinding>,
        probe_interval: Duration,
    ) -> Result<Arc<Self>> {
        let mut static_data = DataTree::new();
        static_data.insert(component_key(name, "class"), model.class().to_string());
        static_data.insert(component_key(name, "parent"), parent.to_string());
        static_data.insert(component_key(name, "model-name"), model.model().to_string());

        let device = Arc::new(Self {
            name: name.to_string(),
            model,
            probe,
            binding,
            probe_interval,
            state: Mutex::new(DeviceState {
                bound: false,
                readers: Vec::new(),
                static_data,
                generation: 0,
            }),
            wake: Notify::new(),
            exit: AtomicBool::new(false),
            task: Mutex::new(None),
        });

        device.probe_once().await?;
        Ok(device)
    }

    /// Real hardware: `/dev/i2c-<bus>` probing and sysfs `new_device`/`delete_device` binding.
    #[allow(clippy::too_many_arguments)]
    pub async fn on_i2c(
        name: &str,
        parent: &str,
        model: Box<dyn PowerDeviceModel>,
        dev_root: &Path,
        devices_root: &Path,
        bus: u8,
        address: u8,
        probe_interval: Duration,
    ) -> Result<Arc<Self>> {
        let probe = I2cProbe::new(dev_root, bus, address);
        let binding = SysfsDriverBinding::new(devices_root, bus, address, model.driver());
        Self::new(name, parent, model, Box::new(probe), Box::new(binding), probe_interval).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_bound(&self) -> bool {
        self.state.lock().await.bound
    }

    pub async fn reader_count(&self) -> usize {
        self.state.lock().await.readers.len()
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// One presence check plus whatever bind/unbind and reader rebuild it implies.
    /// Bus errors are returned, not swallowed.
    pub async fn probe_once(&self) -> Result<()> {
        let present = self.probe.is_present().await?;
        let mut state = self.state.lock().await;

        if present {
            if !self.binding.attributes_dir().exists() {
                info!("{}: {} detected, binding driver", self.name, self.model.model());
                state.readers.clear();
                state.bound = false;
                self.binding.bind().await?;

                if !self.binding.attributes_dir().exists() {
                    warn!("{}: driver bound but no attributes yet, retrying on next probe", self.name);
                    return Ok(());
                }
            }

            if !state.bound {
                let hwmon = match HwmonAttributes::resolve(self.binding.device_dir()) {
                    Ok(hwmon) => hwmon,
                    Err(e) => {
                        warn!("{}: {}, retrying on next probe", self.name, e);
                        return Ok(());
                    }
                };
                state.readers = self.build_readers(&hwmon);
                state.bound = true;
                state.generation += 1;
                info!(
                    "{}: registered {} sensors from {:?}",
                    self.name,
                    state.readers.len(),
                    hwmon.root()
                );
            }
        } else {
            if state.bound {
                info!("{}: {} removed", self.name, self.model.model());
            }
            state.readers.clear();
            state.bound = false;

            if self.binding.attributes_dir().exists() {
                debug!("{}: unbinding driver", self.name);
                self.binding.unbind().await?;
            }
        }

        Ok(())
    }

    fn build_readers(&self, hwmon: &HwmonAttributes) -> Vec<SysfsValue> {
        self.model
            .channels()
            .into_iter()
            .map(|ch| {
                SysfsValue::new(
                    &format!("{}:{}", self.name, ch.suffix),
                    &self.name,
                    ch.sensor,
                    hwmon.clone(),
                    ch.channel,
                )
                .with_thresholds(ch.thresholds)
            })
            .collect()
    }

    fn disabled(&self, static_data: &DataTree) -> PollResult {
        let mut res = PollResult::from(static_data.clone());
        res.insert(component_key(&self.name, "state/oper-state"), "disabled");
        res.side_loaded_alarms.insert(SideLoadedAlarm::new(
            ALARM_SENSOR_MISSING,
            &component_path(&self.name),
            self.model.missing_severity(),
            self.model.missing_description(),
        ));
        res
    }

    /// Read every sensor of the module. If any single read fails the whole result is
    /// replaced by the disabled sub-tree and the probe task is woken.
    pub async fn read_composite(&self) -> PollResult {
        let state = self.state.lock().await;
        if !state.bound {
            return self.disabled(&state.static_data);
        }

        let mut res = PollResult::from(state.static_data.clone());
        res.insert(component_key(&self.name, "state/oper-state"), "enabled");

        for reader in &state.readers {
            match reader.try_read().await {
                Ok(part) => res.merge(part),
                Err(e) => {
                    warn!("{}: {} unreadable while present: {}", self.name, reader.component(), e);
                    self.wake.notify_one();
                    return self.disabled(&state.static_data);
                }
            }
        }

        res.side_loaded_alarms.insert(SideLoadedAlarm::new(
            ALARM_SENSOR_MISSING,
            &component_path(&self.name),
            SEVERITY_CLEARED,
            self.model.missing_description(),
        ));
        res
    }

    /// Spawn the background probe loop. Call [`PowerDevice::shutdown`] to stop it.
    pub async fn start(self: &Arc<Self>) {
        let device = Arc::clone(self);
        let handle = tokio::spawn(async move { device.probe_loop().await });
        if let Some(previous) = self.task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    async fn probe_loop(&self) {
        debug!("{}: probe loop started ({:?})", self.name, self.probe_interval);
        while !self.exit.load(Ordering::SeqCst) {
            // Elapsed timeout and early wake-up are handled the same way.
            let _ = tokio::time::timeout(self.probe_interval, self.wake.notified()).await;
            if self.exit.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.probe_once().await {
                error!("{}: probe cycle failed: {}", self.name, e);
            }
        }
        debug!("{}: probe loop stopped", self.name);
    }

    /// Stop the probe loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.exit.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("{}: probe task ended abnormally: {}", self.name, e);
            }
        }
    }
}

#[async_trait]
impl DataReader for PowerDevice {
    async fn read(&self) -> PollResult {
        self.read_composite().await
    }
}
