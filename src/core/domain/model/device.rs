//! Device-swap configuration embedded in a VM description.

use crate::core::domain::value_object::{DeviceKind, DeviceSlot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The configuration block a VM declares between the swapper markers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwapperConfig {
    pub name: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl SwapperConfig {
    /// Configuration used when a VM's description cannot be parsed.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            devices: Vec::new(),
        }
    }

    /// The configured device occupying `slot`, if any.
    #[must_use]
    pub fn device_at(&self, slot: DeviceSlot) -> Option<&Device> {
        self.devices.iter().find(|device| device.slot == slot)
    }
}

/// A passthrough device declared for a VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Slot the device is attached under (`usb<N>` / `hostpci<N>`).
    #[serde(rename = "as")]
    pub slot: DeviceSlot,
    /// Raw hypervisor attachment string written into the slot.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_options: Option<Map<String, Value>>,
    /// Derived at read time from mapping state; ignored if present in the block.
    #[serde(default)]
    pub connected_to_host: bool,
}

impl Device {
    /// The cluster mapping referenced by the attachment string (`mapping=<name>`).
    #[must_use]
    pub fn mapping_name(&self) -> Option<&str> {
        setting(&self.value, "mapping")
    }

    /// True when the declared type agrees with the slot family.
    #[must_use]
    pub fn slot_matches_kind(&self) -> bool {
        self.slot.kind() == self.kind
    }
}

/// Looks up `key=value` inside a comma separated Proxmox property string.
#[must_use]
pub fn setting<'a>(property_string: &'a str, key: &str) -> Option<&'a str> {
    property_string
        .split(',')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_from_block_json() {
        let device: Device = serde_json::from_value(json!({
            "type": "usb",
            "as": "usb1",
            "value": "mapping=keyboard,usb3=1",
            "otherOptions": {"note": "desk"}
        }))
        .unwrap();

        assert_eq!(device.kind, DeviceKind::Usb);
        assert_eq!(device.slot.to_string(), "usb1");
        assert_eq!(device.mapping_name(), Some("keyboard"));
        assert!(!device.connected_to_host);
        assert!(device.slot_matches_kind());
    }

    #[test]
    fn test_setting_lookup() {
        assert_eq!(setting("id=046d:c52b,node=pve1", "node"), Some("pve1"));
        assert_eq!(setting("host=0000:01:00", "mapping"), None);
        assert_eq!(setting("", "mapping"), None);
    }

    #[test]
    fn test_kind_and_slot_mismatch() {
        let device: Device = serde_json::from_value(json!({
            "type": "pci", "as": "usb0", "value": "mapping=gpu"
        }))
        .unwrap();
        assert!(!device.slot_matches_kind());
    }
}
