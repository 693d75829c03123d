//! Progress payloads published on the job event stream.

use crate::core::domain::model::{job::ActiveJob, vm::VmRef};
use crate::core::domain::value_object::VmId;
use serde::{Deserialize, Serialize};

/// Steps of the swap workflow, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapStatus {
    Initialise,
    WaitingForStop,
    MachineStop,
    RemovingDevices,
    DeviceAttach,
    MachineStart,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapMeta {
    pub id: VmId,
    pub name: String,
    /// The outgoing VM, when one had to be stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<VmRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActiveJobStatus {
    Waiting,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheJobStatus {
    ActiveQMsUpdate,
}

/// Hardware presence change seen by the change detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceEventKind {
    UsbDeviceAttach,
    UsbDeviceDetach,
    /// PCI changes are reported attach-shaped whatever the direction.
    PciDeviceAttach,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub event: DeviceEventKind,
    /// Mapping id (USB) or hardware address (PCI).
    pub device: String,
    pub connected_to_host: bool,
}

/// Every progress payload a worker can publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Progress {
    Swap {
        status: SwapStatus,
        meta: SwapMeta,
    },
    Active {
        job: ActiveJob,
        status: ActiveJobStatus,
        meta: VmRef,
    },
    Cache {
        status: CacheJobStatus,
    },
    Device(DeviceEvent),
    /// A step failed or was escalated but the job carried on.
    Warning {
        meta: VmRef,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_wire_shape() {
        let progress = Progress::Swap {
            status: SwapStatus::WaitingForStop,
            meta: SwapMeta {
                id: VmId::new(101),
                name: "linux".to_string(),
                started: Some(VmRef {
                    id: VmId::new(100),
                    name: "windows".to_string(),
                }),
            },
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({
                "kind": "swap",
                "status": "waitingForStop",
                "meta": {"id": 101, "name": "linux", "started": {"id": 100, "name": "windows"}}
            })
        );

        let device = Progress::Device(DeviceEvent {
            event: DeviceEventKind::UsbDeviceDetach,
            device: "keyboard".to_string(),
            connected_to_host: false,
        });
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["event"], "usb-device-detach");
        assert_eq!(serde_json::from_value::<Progress>(value).unwrap(), device);
    }
}
