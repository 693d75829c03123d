//! Results returned by the services and recorded as job results.

use crate::core::domain::model::{device_mapping::DeviceMapping, job::ActiveJob, vm::VmRef};
use crate::core::domain::value_object::VmId;
use crate::swapper::application::response::progress::DeviceEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFailure {
    pub id: VmId,
    pub error: String,
}

/// Summary of one registry refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefreshReport {
    pub vms: usize,
    pub active: Vec<VmId>,
    /// VMs whose overview could not be refreshed this cycle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<RefreshFailure>,
    /// Set when the mapping snapshot failed and connectivity defaulted to off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings_error: Option<String>,
}

/// Slot changes applied to one VM.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceSyncReport {
    pub removed: Vec<String>,
    pub attached: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub target: VmRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<VmRef>,
    pub devices: DeviceSyncReport,
}

/// Result of an active-VM operation; having no active VM is an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ActiveOutcome {
    #[serde(rename_all = "camelCase")]
    Completed {
        job: ActiveJob,
        vm: VmRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        devices: Option<DeviceSyncReport>,
        /// Set when the graceful shutdown of a Stop failed and cleanup ran anyway.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shutdown_error: Option<String>,
    },
    NoActiveVm,
}

/// Mappings whose connectivity flipped since the last persisted snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub usb: Vec<DeviceMapping>,
    pub pci: Vec<DeviceMapping>,
    pub events: Vec<DeviceEvent>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.usb.is_empty() && self.pci.is_empty()
    }
}
