//! Config file loading and validation.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::types::AgentConfig;
use crate::hardware::hotplug::models::model_for;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pankha-hwstate/config.json";

pub async fn load_config(path: Option<&str>) -> Result<AgentConfig> {
    let config_path = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));

    if config_path.exists() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read {:?}", config_path))?;
        let mut config: AgentConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {:?}", config_path))?;
        config.ensure_chassis();
        info!("Loaded configuration from: {:?}", config_path);
        Ok(config)
    } else if path.is_some() {
        bail!("Configuration file not found: {:?}", config_path)
    } else {
        info!("No configuration at {:?}, using defaults", config_path);
        Ok(AgentConfig::default())
    }
}

/// Reject configurations that would fail half-way through startup.
pub fn validate_config(config: &AgentConfig) -> Result<()> {
    if !(config.agent.poll_interval > 0.0) {
        bail!("agent.poll_interval must be positive, got {}", config.agent.poll_interval);
    }
    if !(config.hotplug.probe_interval > 0.0) {
        bail!("hotplug.probe_interval must be positive, got {}", config.hotplug.probe_interval);
    }

    let mut names = HashSet::new();
    let all_names = config
        .components
        .iter()
        .map(|c| c.name.as_str())
        .chain(config.sensors.iter().map(|s| s.name.as_str()))
        .chain(config.hotplug.devices.iter().map(|d| d.name.as_str()));
    for name in all_names {
        if !names.insert(name) {
            bail!("Component '{}' is configured more than once", name);
        }
    }

    // Every parent has to be published by some other reader.
    let components: HashSet<&str> = config.components.iter().map(|c| c.name.as_str()).collect();
    for component in &config.components {
        if let Some(parent) = component.parent.as_deref() {
            if parent == component.name || !components.contains(parent) {
                bail!("Component '{}': parent '{}' is not a configured component", component.name, parent);
            }
        }
    }
    for sensor in &config.sensors {
        let known = components.contains(sensor.parent.as_str())
            || config.hotplug.devices.iter().any(|d| d.name == sensor.parent);
        if !known {
            bail!("Sensor '{}': parent '{}' is not a configured component", sensor.name, sensor.parent);
        }
    }
    if !config.hotplug.devices.is_empty() && !components.contains(config.agent.name.as_str()) {
        bail!("Hot-plug devices hang off '{}', which is not a configured component", config.agent.name);
    }

    for device in &config.hotplug.devices {
        model_for(&device.model).with_context(|| format!("Hot-plug device '{}'", device.name))?;
        if device.address > 0x7f {
            bail!("Hot-plug device '{}': address {:#04x} is not a 7-bit address", device.name, device.address);
        }
    }

    Ok(())
}
