use crate::core::domain::{
    error::SwapperResult,
    model::device_mapping::{ConnectivitySnapshot, DeviceMapping, NodeHardware, RawMapping},
    value_object::{DeviceKind, UsbId},
};
use crate::swapper::context::SwapperContext;
use tracing::{debug, warn};

/// Enriches cluster mappings with whether their hardware is currently plugged in.
#[derive(Debug, Clone)]
pub struct MappingService {
    ctx: SwapperContext,
}

impl MappingService {
    pub fn new(ctx: SwapperContext) -> Self {
        Self { ctx }
    }

    /// Mappings of `kind`, each marked connected when any referenced node reports matching hardware.
    pub async fn mappings(&self, kind: DeviceKind) -> SwapperResult<Vec<DeviceMapping>> {
        let raw = self.ctx.hypervisor.mappings(kind).await?;

        let mut nodes: Vec<String> = Vec::new();
        for node in raw.iter().flat_map(RawMapping::nodes) {
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }

        let mut hardware = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut present = NodeHardware {
                node,
                ..NodeHardware::default()
            };
            match kind {
                DeviceKind::Usb => present.usb = self.ctx.hypervisor.usb_hardware(&present.node).await?,
                DeviceKind::Pci => present.pci = self.ctx.hypervisor.pci_hardware(&present.node).await?,
            }
            hardware.push(present);
        }

        let mappings: Vec<DeviceMapping> = raw
            .into_iter()
            .map(|mapping| enrich_mapping(kind, mapping, &hardware))
            .collect();
        debug!(
            kind = %kind,
            total = mappings.len(),
            connected = mappings.iter().filter(|m| m.connected_to_host).count(),
            "mappings resolved"
        );
        Ok(mappings)
    }

    /// Both kinds, fetched back to back.
    pub async fn snapshot(&self) -> SwapperResult<ConnectivitySnapshot> {
        Ok(ConnectivitySnapshot {
            usb: self.mappings(DeviceKind::Usb).await?,
            pci: self.mappings(DeviceKind::Pci).await?,
        })
    }
}

/// Decides connectivity of one mapping against the hardware of every queried node.
pub fn enrich_mapping(kind: DeviceKind, mapping: RawMapping, hardware: &[NodeHardware]) -> DeviceMapping {
    let (dev_id, connected_to_host) = match kind {
        DeviceKind::Usb => {
            let dev_id = mapping.hardware_id().map(str::to_string);
            let connected = match dev_id.as_deref().map(UsbId::parse) {
                Some(Ok(usb_id)) => hardware.iter().any(|node| node.has_usb(&usb_id)),
                Some(Err(e)) => {
                    warn!(mapping = %mapping.id, error = %e, "unreadable USB id in mapping");
                    false
                }
                None => false,
            };
            (dev_id, connected)
        }
        DeviceKind::Pci => {
            let paths = mapping.paths();
            let connected = paths
                .iter()
                .any(|path| hardware.iter().any(|node| node.has_pci(path)));
            (paths.first().map(|p| (*p).to_string()), connected)
        }
    };

    DeviceMapping {
        kind,
        id: mapping.id,
        dev_id,
        map: mapping.map,
        description: mapping.description,
        connected_to_host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::device_mapping::{PciHardware, UsbHardware};

    fn raw(id: &str, map: &[&str]) -> RawMapping {
        RawMapping {
            id: id.to_string(),
            description: None,
            map: map.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn node_with_usb(vendid: &str, prodid: &str) -> NodeHardware {
        NodeHardware {
            node: "pve1".to_string(),
            usb: vec![UsbHardware {
                vendid: vendid.to_string(),
                prodid: prodid.to_string(),
                product: None,
                manufacturer: None,
                busnum: None,
                devnum: None,
            }],
            pci: Vec::new(),
        }
    }

    #[test]
    fn test_usb_mapping_connectivity() {
        let hardware = vec![node_with_usb("046d", "c52b")];
        let keyboard = enrich_mapping(
            DeviceKind::Usb,
            raw("keyboard", &["id=046d:c52b,node=pve1"]),
            &hardware,
        );
        let pad = enrich_mapping(
            DeviceKind::Usb,
            raw("pad", &["id=054c:0ce6,node=pve1"]),
            &hardware,
        );

        assert!(keyboard.connected_to_host);
        assert_eq!(keyboard.dev_id.as_deref(), Some("046d:c52b"));
        assert!(!pad.connected_to_host);
    }

    #[test]
    fn test_pci_mapping_connectivity() {
        let hardware = vec![NodeHardware {
            node: "pve1".to_string(),
            usb: Vec::new(),
            pci: vec![PciHardware {
                id: "0000:01:00.0".to_string(),
                vendor: Some("0x10de".to_string()),
                device: None,
                iommugroup: Some(14),
            }],
        }];
        let gpu = enrich_mapping(
            DeviceKind::Pci,
            raw("gpu", &["id=10de:2204,node=pve1,path=0000:01:00"]),
            &hardware,
        );
        let nic = enrich_mapping(
            DeviceKind::Pci,
            raw("nic", &["id=8086:1533,node=pve1,path=0000:05:00.0"]),
            &hardware,
        );

        assert!(gpu.connected_to_host);
        assert_eq!(gpu.change_key(), "0000:01:00");
        assert!(!nic.connected_to_host);
    }
}
