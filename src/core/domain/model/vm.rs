//! Domain models for QEMU virtual machines taking part in device swapping.

use crate::core::domain::model::{
    cluster_resource::{QemuResource, split_tags},
    device::SwapperConfig,
};
use crate::core::domain::value_object::{DeviceSlot, VmId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw hypervisor configuration of a VM, as returned by `/nodes/{node}/qemu/{vmid}/config`.
pub type VmConfigMap = Map<String, Value>;

/// Lifecycle status of a VM as reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Stopped,
    Running,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VmStatus {
    /// Anything the hypervisor does not report as stopped counts towards the active set.
    #[must_use]
    pub fn is_active(self) -> bool {
        self != VmStatus::Stopped
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VmStatus::Stopped => "stopped",
            VmStatus::Running => "running",
            VmStatus::Unknown => "unknown",
        })
    }
}

/// Transient read-model of a participation-tagged VM.
///
/// Built on demand from the listing or from cached overviews; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub id: VmId,
    pub name: String,
    pub node_id: String,
    pub tags: Vec<String>,
    pub status: VmStatus,
}

impl VirtualMachine {
    #[must_use]
    pub fn from_resource(resource: &QemuResource) -> Self {
        Self {
            id: VmId::new(resource.vmid),
            name: resource
                .name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            node_id: resource.node.clone(),
            tags: resource.tag_list(),
            status: resource.status,
        }
    }

    #[must_use]
    pub fn from_overview(overview: &VmOverview) -> Self {
        Self {
            id: overview.id,
            name: overview.name().unwrap_or("unknown").to_string(),
            node_id: overview.node.clone(),
            tags: overview.tags(),
            status: overview.status,
        }
    }

    #[must_use]
    pub fn vm_ref(&self) -> VmRef {
        VmRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Id and name of a VM, carried by progress events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRef {
    pub id: VmId,
    pub name: String,
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

/// Cached per-VM overview stored under `qm:<id>`.
///
/// The full hypervisor configuration is flattened next to the swapper fields,
/// so the JSON looks like the hypervisor's config with `id`, `node`, `status`
/// and `swapper` added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmOverview {
    pub id: VmId,
    pub node: String,
    #[serde(default)]
    pub status: VmStatus,
    pub swapper: SwapperConfig,
    #[serde(flatten)]
    pub config: VmConfigMap,
}

impl VmOverview {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.config.get("name").and_then(Value::as_str)
    }

    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.config
            .get("tags")
            .and_then(Value::as_str)
            .map(split_tags)
            .unwrap_or_default()
    }
}

/// Hardware slots currently present in a VM configuration.
#[must_use]
pub fn attached_slots(config: &VmConfigMap) -> Vec<DeviceSlot> {
    let mut slots: Vec<DeviceSlot> = config
        .keys()
        .filter_map(|key| DeviceSlot::from_config_key(key))
        .collect();
    slots.sort();
    slots
}

/// Runtime status of a VM from `/nodes/{node}/qemu/{vmid}/status/current`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VmStatusCurrent {
    /// Current VM status (e.g., "running", "stopped").
    pub status: VmStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// QEMU process status (e.g., "running", "paused").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qmpstatus: Option<String>,
    /// Uptime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
}
