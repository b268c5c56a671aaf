//! Builds the reader registry and hot-plug devices described by the config.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::types::{AgentConfig, SensorConfig};
use crate::hardware::aggregator::HardwareState;
use crate::hardware::hotplug::models::model_for;
use crate::hardware::hotplug::PowerDevice;
use crate::hardware::reader::{component_facts, SysfsValue};
use crate::hardware::sysfs::HwmonAttributes;

pub struct Hardware {
    pub state: HardwareState,
    /// Hot-plug devices, also registered in `state`. Their probe loops are not started yet.
    pub devices: Vec<Arc<PowerDevice>>,
}

/// Registration order: static components, then fixed sensors, then hot-plug
/// devices. Later readers win key collisions.
pub async fn build_hardware(config: &AgentConfig) -> Result<Hardware> {
    let mut state = HardwareState::new();

    for component in &config.components {
        debug!("Static component {} ({})", component.name, component.class);
        state.register_reader(component_facts(
            &component.name,
            &component.class,
            component.parent.as_deref(),
            component.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ));
    }

    for sensor in &config.sensors {
        state.register_reader(sysfs_sensor(sensor)?);
    }

    let probe_interval = Duration::from_secs_f64(config.hotplug.probe_interval);
    let mut devices = Vec::new();
    for device in &config.hotplug.devices {
        let model = model_for(&device.model)
            .with_context(|| format!("Hot-plug device '{}'", device.name))?;
        let power_device = PowerDevice::on_i2c(
            &device.name,
            &config.agent.name,
            model,
            &config.hotplug.dev_root,
            &config.hotplug.i2c_devices_root,
            device.bus,
            device.address,
            probe_interval,
        )
        .await
        .with_context(|| format!("Failed to initialize hot-plug device '{}'", device.name))?;

        state.register_reader(Arc::clone(&power_device));
        devices.push(power_device);
    }

    info!(
        "Registered {} readers ({} hot-plug devices)",
        state.reader_count(),
        devices.len()
    );
    Ok(Hardware { state, devices })
}

fn sysfs_sensor(sensor: &SensorConfig) -> Result<SysfsValue> {
    // A device directory is resolved once; a direct hwmon directory is used as is.
    let hwmon = if sensor.hwmon_dir.join("hwmon").is_dir() {
        HwmonAttributes::resolve(&sensor.hwmon_dir)
            .with_context(|| format!("Sensor '{}'", sensor.name))?
    } else {
        HwmonAttributes::new(&sensor.hwmon_dir)
    };
    debug!("Sensor {} reads {:?}", sensor.name, hwmon.root());

    let reader = SysfsValue::new(&sensor.name, &sensor.parent, sensor.kind, hwmon, sensor.channel);
    Ok(match sensor.thresholds {
        Some(thresholds) => reader.with_thresholds(thresholds),
        None => reader,
    })
}
