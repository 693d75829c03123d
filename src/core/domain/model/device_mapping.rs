//! Cluster-level hardware mappings and the node hardware they are matched against.

use crate::core::domain::model::device::{Device, setting};
use crate::core::domain::value_object::{DeviceKind, UsbId};
use serde::{Deserialize, Serialize};

/// A mapping as returned by `/cluster/mapping/{usb,pci}`.
///
/// Every `map` entry is a property string such as `id=046d:c52b,node=pve1`
/// (USB) or `id=10de:2204,node=pve1,path=0000:01:00` (PCI).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawMapping {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub map: Vec<String>,
}

impl RawMapping {
    /// Distinct node names referenced by the mapping, in declaration order.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes = Vec::new();
        for entry in &self.map {
            if let Some(node) = setting(entry, "node") {
                if !nodes.iter().any(|n| n == node) {
                    nodes.push(node.to_string());
                }
            }
        }
        nodes
    }

    /// The first `id=` value of the mapping (vendor:product for USB and PCI).
    #[must_use]
    pub fn hardware_id(&self) -> Option<&str> {
        self.map.iter().find_map(|entry| setting(entry, "id"))
    }

    /// All `path=` values (PCI addresses).
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.map
            .iter()
            .filter_map(|entry| setting(entry, "path"))
            .collect()
    }
}

/// A USB device visible on a node (`/nodes/{node}/hardware/usb`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UsbHardware {
    pub vendid: String,
    pub prodid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busnum: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devnum: Option<u32>,
}

/// A PCI function visible on a node (`/nodes/{node}/hardware/pci`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PciHardware {
    /// Full address, e.g. `0000:01:00.0`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iommugroup: Option<i64>,
}

impl PciHardware {
    /// True when this function is `path` itself or one of its functions
    /// (`0000:01:00` covers `0000:01:00.0` and `0000:01:00.1`).
    #[must_use]
    pub fn is_at(&self, path: &str) -> bool {
        self.id == path
            || self
                .id
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// A cluster mapping enriched with live host connectivity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMapping {
    pub kind: DeviceKind,
    /// Mapping name, referenced by devices as `mapping=<id>`.
    pub id: String,
    /// Hardware identifier: `vendor:product` for USB, the PCI address for PCI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<String>,
    #[serde(default)]
    pub map: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// True if at least one queried node currently reports the hardware.
    #[serde(default)]
    pub connected_to_host: bool,
}

impl DeviceMapping {
    /// Identifier the change detector keys this mapping by.
    #[must_use]
    pub fn change_key(&self) -> &str {
        match self.kind {
            DeviceKind::Usb => &self.id,
            DeviceKind::Pci => self.dev_id.as_deref().unwrap_or(&self.id),
        }
    }
}

/// Connectivity-enriched mappings of both kinds, fetched together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectivitySnapshot {
    pub usb: Vec<DeviceMapping>,
    pub pci: Vec<DeviceMapping>,
}

impl ConnectivitySnapshot {
    /// The mapping backing `device`, if one is known.
    ///
    /// Both kinds resolve through the `mapping=<id>` in the device value. A PCI
    /// device given as a raw address has no mapping and counts as not connected.
    #[must_use]
    pub fn mapping_for(&self, device: &Device) -> Option<&DeviceMapping> {
        let name = device.mapping_name();
        match device.kind {
            DeviceKind::Usb => find_by_name(&self.usb, name),
            DeviceKind::Pci => find_by_name(&self.pci, name),
        }
    }

    /// Unmatched devices count as not connected.
    #[must_use]
    pub fn is_connected(&self, device: &Device) -> bool {
        self.mapping_for(device)
            .is_some_and(|mapping| mapping.connected_to_host)
    }
}

fn find_by_name<'a>(mappings: &'a [DeviceMapping], name: Option<&str>) -> Option<&'a DeviceMapping> {
    name.and_then(|name| mappings.iter().find(|m| m.id == name))
}

/// Hardware reported by one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeHardware {
    pub node: String,
    pub usb: Vec<UsbHardware>,
    pub pci: Vec<PciHardware>,
}

impl NodeHardware {
    #[must_use]
    pub fn has_usb(&self, id: &UsbId) -> bool {
        self.usb.iter().any(|dev| id.matches(&dev.vendid, &dev.prodid))
    }

    #[must_use]
    pub fn has_pci(&self, path: &str) -> bool {
        self.pci.iter().any(|dev| dev.is_at(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(map: &[&str]) -> RawMapping {
        RawMapping {
            id: "gpu".to_string(),
            description: None,
            map: map.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_nodes_are_distinct() {
        let mapping = raw(&[
            "id=10de:2204,node=pve1,path=0000:01:00",
            "id=10de:2204,node=pve2,path=0000:02:00",
            "id=10de:2204,node=pve1,path=0000:03:00",
        ]);
        assert_eq!(mapping.nodes(), vec!["pve1", "pve2"]);
        assert_eq!(mapping.hardware_id(), Some("10de:2204"));
        assert_eq!(mapping.paths().len(), 3);
    }

    fn mapping(kind: DeviceKind, id: &str, dev_id: &str, connected: bool) -> DeviceMapping {
        DeviceMapping {
            kind,
            id: id.to_string(),
            dev_id: Some(dev_id.to_string()),
            map: Vec::new(),
            description: None,
            connected_to_host: connected,
        }
    }

    fn device(json: serde_json::Value) -> Device {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = ConnectivitySnapshot {
            usb: vec![mapping(DeviceKind::Usb, "keyboard", "046d:c52b", true)],
            pci: vec![
                mapping(DeviceKind::Pci, "gpu", "0000:01:00", true),
                mapping(DeviceKind::Pci, "nic", "0000:03:00", true),
            ],
        };

        let keyboard = device(serde_json::json!({"type": "usb", "as": "usb0", "value": "mapping=keyboard"}));
        let mouse = device(serde_json::json!({"type": "usb", "as": "usb1", "value": "mapping=mouse"}));
        let gpu = device(serde_json::json!({"type": "pci", "as": "hostpci0", "value": "mapping=gpu,pcie=1"}));
        let nic = device(serde_json::json!({"type": "pci", "as": "hostpci1", "value": "0000:03:00"}));

        assert!(snapshot.is_connected(&keyboard));
        assert!(!snapshot.is_connected(&mouse));
        assert!(snapshot.is_connected(&gpu));
        assert!(snapshot.mapping_for(&nic).is_none());
        assert!(!snapshot.is_connected(&nic));
    }

    #[test]
    fn test_pci_address_matching() {
        let function = PciHardware {
            id: "0000:01:00.1".to_string(),
            vendor: None,
            device: None,
            iommugroup: None,
        };
        assert!(function.is_at("0000:01:00"));
        assert!(function.is_at("0000:01:00.1"));
        assert!(!function.is_at("0000:01:00.0"));
        assert!(!function.is_at("0000:01:0"));
    }
}
