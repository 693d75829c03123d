//! Values the registry persists in the cache store, and the keys they live under.

use crate::core::domain::value_object::{DeviceKind, VmId};
use serde::{Deserialize, Serialize};

/// Enumeration of every participation-tagged VM.
pub const MASTER_LIST_KEY: &str = "qm:masterlist";
/// Ids of the VMs whose status is not stopped, in listing order.
pub const ACTIVE_KEY: &str = "qm:active";

/// Key of the cached overview of one VM.
#[must_use]
pub fn overview_key(id: VmId) -> String {
    format!("qm:{}", id)
}

/// Key of the last persisted mapping snapshot of a device kind.
#[must_use]
pub fn mappings_key(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Usb => "usb:mappings",
        DeviceKind::Pci => "pci:mappings",
    }
}

/// One row of the master list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterListEntry {
    pub id: VmId,
    pub node: String,
}

pub type MasterList = Vec<MasterListEntry>;

pub type ActiveSet = Vec<VmId>;
