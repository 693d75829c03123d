//! Power and device operations against a single VM.

use crate::core::domain::{
    error::{SwapperError, SwapperResult},
    model::{
        device::SwapperConfig,
        device_mapping::ConnectivitySnapshot,
        vm::{VirtualMachine, VmConfigMap, VmStatus, attached_slots},
    },
};
use crate::core::infrastructure::queue::JobContext;
use crate::swapper::application::{
    response::{outcome::DeviceSyncReport, progress::Progress},
    service::{config_extractor::extract_config, mapping_service::MappingService},
};
use crate::swapper::context::SwapperContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// What a resync will change on a VM.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResyncPlan {
    /// Attached slots whose configured device is not plugged in.
    pub remove: Vec<String>,
    /// Slot to attachment string for every configured device that is plugged in.
    pub attach: BTreeMap<String, String>,
}

/// Computes the slot changes for a VM from its live configuration and its enriched swap config.
#[must_use]
pub fn plan_resync(live: &VmConfigMap, swapper: &SwapperConfig) -> ResyncPlan {
    let remove = attached_slots(live)
        .into_iter()
        .filter(|slot| {
            swapper
                .device_at(*slot)
                .is_some_and(|device| !device.connected_to_host)
        })
        .map(|slot| slot.to_string())
        .collect();
    let attach = swapper
        .devices
        .iter()
        .filter(|device| device.connected_to_host)
        .map(|device| (device.slot.to_string(), device.value.clone()))
        .collect();
    ResyncPlan { remove, attach }
}

#[derive(Debug, Clone)]
pub struct MachineService {
    ctx: SwapperContext,
}

impl MachineService {
    pub fn new(ctx: SwapperContext) -> Self {
        Self { ctx }
    }

    /// Graceful shutdown with a bounded wait.
    ///
    /// The hypervisor is asked to shut down with its own forced-stop fallback.
    /// If the VM still runs after the configured timeout, a warning is reported,
    /// a halt is issued and the wait repeats once.
    ///
    /// # Errors
    /// `ShutdownTimeout` when the VM still runs after both waits.
    pub async fn shutdown(&self, vm: &VirtualMachine, job: &JobContext) -> SwapperResult<()> {
        let timeout = self.ctx.options.shutdown_timeout;
        info!(vmid = %vm.id, node = %vm.node_id, timeout_secs = timeout.as_secs(), "shutting down VM");
        self.ctx
            .hypervisor
            .shutdown_vm(&vm.node_id, vm.id, true, timeout.as_secs())
            .await?;

        if self.wait_until_stopped(vm, timeout).await? {
            return Ok(());
        }

        let message = format!(
            "QM {} still running after {}s, halting",
            vm.id,
            timeout.as_secs()
        );
        warn!(vmid = %vm.id, "{}", message);
        job.progress(&Progress::Warning {
            meta: vm.vm_ref(),
            message,
        });
        self.halt(vm).await?;

        if self.wait_until_stopped(vm, timeout).await? {
            return Ok(());
        }
        Err(SwapperError::ShutdownTimeout {
            vmid: vm.id.get(),
            waited_secs: timeout.as_secs() * 2,
        })
    }

    /// Polls the status until it leaves `running`; `false` once `limit` has passed.
    async fn wait_until_stopped(&self, vm: &VirtualMachine, limit: Duration) -> SwapperResult<bool> {
        let deadline = Instant::now() + limit;
        loop {
            let status = self.ctx.hypervisor.vm_status(&vm.node_id, vm.id).await?;
            if status.status != VmStatus::Running {
                debug!(vmid = %vm.id, status = %status.status, "VM left running state");
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            time::sleep(self.ctx.options.shutdown_poll).await;
        }
    }

    /// Immediate stop without guest cooperation.
    pub async fn halt(&self, vm: &VirtualMachine) -> SwapperResult<()> {
        info!(vmid = %vm.id, node = %vm.node_id, "halting VM");
        self.ctx.hypervisor.stop_vm(&vm.node_id, vm.id).await
    }

    /// Fire-and-forget start; boot progress is left to the hypervisor.
    pub async fn start(&self, vm: &VirtualMachine) -> SwapperResult<()> {
        info!(vmid = %vm.id, node = %vm.node_id, "starting VM");
        self.ctx.hypervisor.start_vm(&vm.node_id, vm.id).await
    }

    /// Detaches configured devices that are no longer plugged in.
    pub async fn remove_devices(&self, vm: &VirtualMachine) -> SwapperResult<DeviceSyncReport> {
        let plan = self.plan(vm).await?;
        self.delete(vm, &plan.remove).await?;
        Ok(DeviceSyncReport {
            removed: plan.remove,
            attached: Vec::new(),
        })
    }

    /// Detaches unplugged devices, then writes every plugged-in device into its slot.
    pub async fn sync_devices(&self, vm: &VirtualMachine) -> SwapperResult<DeviceSyncReport> {
        let plan = self.plan(vm).await?;
        self.delete(vm, &plan.remove).await?;
        if !plan.attach.is_empty() {
            info!(vmid = %vm.id, slots = ?plan.attach.keys().collect::<Vec<_>>(), "attaching devices");
            self.ctx
                .hypervisor
                .set_vm_devices(&vm.node_id, vm.id, &plan.attach)
                .await?;
        }
        Ok(DeviceSyncReport {
            removed: plan.remove,
            attached: plan.attach.into_keys().collect(),
        })
    }

    /// Plan from the live configuration and a fresh connectivity snapshot.
    async fn plan(&self, vm: &VirtualMachine) -> SwapperResult<ResyncPlan> {
        let live = self.ctx.hypervisor.vm_config(&vm.node_id, vm.id).await?;
        let connectivity = MappingService::new(self.ctx.clone()).snapshot().await?;
        let swapper = swapper_config(vm, &live, &connectivity);
        Ok(plan_resync(&live, &swapper))
    }

    async fn delete(&self, vm: &VirtualMachine, slots: &[String]) -> SwapperResult<()> {
        if slots.is_empty() {
            return Ok(());
        }
        info!(vmid = %vm.id, slots = ?slots, "removing devices");
        self.ctx
            .hypervisor
            .delete_vm_devices(&vm.node_id, vm.id, slots)
            .await
    }
}

fn swapper_config(
    vm: &VirtualMachine,
    live: &VmConfigMap,
    connectivity: &ConnectivitySnapshot,
) -> SwapperConfig {
    let description = live
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    extract_config(description, connectivity).unwrap_or_else(|e| {
        debug!(vmid = %vm.id, error = %e, "no usable swapper config, nothing to sync");
        SwapperConfig::empty(vm.name.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn swapper(devices: Value) -> SwapperConfig {
        serde_json::from_value(json!({"name": "desk", "devices": devices})).unwrap()
    }

    #[test]
    fn test_plan_removes_only_configured_unplugged_slots() {
        let live: VmConfigMap = serde_json::from_value(json!({
            "usb0": "mapping=keyboard",
            "usb1": "mapping=mouse",
            "usb2": "host=1-2",
            "hostpci0": "mapping=gpu"
        }))
        .unwrap();
        let config = swapper(json!([
            {"type": "usb", "as": "usb0", "value": "mapping=keyboard", "connectedToHost": true},
            {"type": "usb", "as": "usb1", "value": "mapping=mouse", "connectedToHost": false},
            {"type": "pci", "as": "hostpci0", "value": "mapping=gpu", "connectedToHost": false},
            {"type": "usb", "as": "usb3", "value": "mapping=pad", "connectedToHost": true}
        ]));

        let plan = plan_resync(&live, &config);

        assert_eq!(plan.remove, vec!["usb1", "hostpci0"]);
        assert_eq!(
            plan.attach,
            BTreeMap::from([
                ("usb0".to_string(), "mapping=keyboard".to_string()),
                ("usb3".to_string(), "mapping=pad".to_string()),
            ])
        );
    }

    #[test]
    fn test_plan_for_vm_without_config() {
        let live: VmConfigMap = serde_json::from_value(json!({"usb0": "host=1-2"})).unwrap();
        assert_eq!(
            plan_resync(&live, &SwapperConfig::empty("bare")),
            ResyncPlan::default()
        );
    }
}
