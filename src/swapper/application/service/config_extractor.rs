//! Reads the device-swap block embedded in a VM description.
//!
//! A description carries the block between two literal markers:
//!
//! ```text
//! Gaming VM, owns the GPU while running.
//! --swapper.config.start--
//! { name: "gaming", devices: [{ type: "pci", as: "hostpci0", value: "mapping=gpu,pcie=1" }] }
//! --swapper.config.end--
//! ```
//!
//! The block is JSON5, so comments, unquoted keys and trailing commas are accepted.

use crate::core::domain::{
    error::ConfigError,
    model::{device::SwapperConfig, device_mapping::ConnectivitySnapshot},
};

pub const START_MARKER: &str = "--swapper.config.start--";
pub const END_MARKER: &str = "--swapper.config.end--";

/// Text between the markers. Each marker must appear exactly once, start before end.
pub fn config_block(description: &str) -> Result<&str, ConfigError> {
    let missing = || ConfigError::MissingMarkers {
        description: description.to_string(),
    };
    if description.matches(START_MARKER).count() != 1 || description.matches(END_MARKER).count() != 1
    {
        return Err(missing());
    }
    let start = description.find(START_MARKER).ok_or_else(missing)? + START_MARKER.len();
    let end = description.find(END_MARKER).ok_or_else(missing)?;
    if end < start {
        return Err(missing());
    }
    Ok(&description[start..end])
}

/// Parses the configuration block and decorates every device with its current connectivity.
pub fn extract_config(
    description: &str,
    connectivity: &ConnectivitySnapshot,
) -> Result<SwapperConfig, ConfigError> {
    let block = config_block(description)?;
    let config: SwapperConfig =
        json5::from_str(block).map_err(|e| ConfigError::MalformedConfig {
            message: e.to_string(),
            block: block.to_string(),
        })?;

    if let Some(device) = config.devices.iter().find(|d| !d.slot_matches_kind()) {
        return Err(ConfigError::MalformedConfig {
            message: format!("device of type {} cannot use slot {}", device.kind, device.slot),
            block: block.to_string(),
        });
    }

    Ok(enrich(config, connectivity))
}

/// Recomputes `connected_to_host` of every device; any value from the block is discarded.
#[must_use]
pub fn enrich(mut config: SwapperConfig, connectivity: &ConnectivitySnapshot) -> SwapperConfig {
    for device in &mut config.devices {
        device.connected_to_host = connectivity.is_connected(device);
    }
    config
}

/// The human-readable part of a description: everything before the start marker.
#[must_use]
pub fn extract_description(description: &str) -> &str {
    match description.find(START_MARKER) {
        Some(index) => &description[..index],
        None => description,
    }
}
