//! Domain models for cluster-wide resources.
//!
//! This module defines the structures returned by the `/cluster/resources?type=vm`
//! endpoint. The response mixes QEMU machines and LXC containers, each identified
//! by a `type` field. Only QEMU machines take part in device swapping.

use crate::core::domain::model::vm::VmStatus;
use serde::{Deserialize, Serialize};

/// A resource discovered in the Proxmox cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClusterResource {
    /// A QEMU virtual machine.
    Qemu(QemuResource),
    /// An LXC container.
    Lxc(QemuResource),
    /// Storage, nodes, pools and anything else the listing may carry.
    #[serde(other)]
    Other,
}

impl ClusterResource {
    /// Returns the QEMU machine behind this resource, if it is one.
    #[must_use]
    pub fn as_qemu(&self) -> Option<&QemuResource> {
        match self {
            ClusterResource::Qemu(vm) => Some(vm),
            _ => None,
        }
    }
}

/// A guest resource (`qemu` or `lxc`) row of the cluster listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QemuResource {
    /// The VM identifier (unique per cluster).
    pub vmid: u32,
    /// The Proxmox node hosting the guest.
    pub node: String,
    /// Human-readable name (may be absent).
    #[serde(default)]
    pub name: Option<String>,
    /// Guest status (`running`, `stopped`, ...).
    #[serde(default)]
    pub status: VmStatus,
    /// Semicolon separated tag list.
    #[serde(default)]
    pub tags: Option<String>,
    /// Set to 1 for templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<u8>,
    /// Uptime in seconds (if running).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
}

impl QemuResource {
    /// Tags as a list, split the way Proxmox stores them.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        split_tags(self.tags.as_deref().unwrap_or_default())
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list().iter().any(|t| t == tag)
    }
}

/// Splits a Proxmox tag string. Proxmox writes `;`, older tooling `,` or spaces.
#[must_use]
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split([';', ',', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_with_mixed_types() {
        let resources: Vec<ClusterResource> = serde_json::from_value(serde_json::json!([
            {"type": "qemu", "vmid": 100, "node": "pve1", "id": "qemu/100",
             "name": "gaming", "status": "running", "tags": "swapper;windows"},
            {"type": "lxc", "vmid": 200, "node": "pve1", "id": "lxc/200", "status": "stopped"},
            {"type": "storage", "storage": "local", "node": "pve1", "id": "storage/local"}
        ]))
        .unwrap();

        assert_eq!(resources.len(), 3);
        let vm = resources[0].as_qemu().unwrap();
        assert_eq!(vm.status, VmStatus::Running);
        assert!(vm.has_tag("swapper"));
        assert!(!vm.has_tag("swap"));
        assert!(resources[1].as_qemu().is_none());
        assert_eq!(resources[2], ClusterResource::Other);
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("a;b, c"), vec!["a", "b", "c"]);
        assert!(split_tags("").is_empty());
    }
}
