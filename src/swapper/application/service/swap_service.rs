//! Moves passthrough hardware from the active VM to a requested target.
//!
//! Order within one swap is fixed: stop the outgoing VM, free its devices,
//! attach devices to the target, start the target. A failing step aborts the
//! rest and nothing already done is rolled back.

use crate::core::domain::{
    error::{SwapperError, SwapperResult},
    model::vm::VirtualMachine,
    value_object::VmId,
};
use crate::core::infrastructure::queue::JobContext;
use crate::swapper::application::{
    response::{
        outcome::SwapOutcome,
        progress::{Progress, SwapMeta, SwapStatus},
    },
    service::{machine_service::MachineService, registry_service::RegistryService},
};
use crate::swapper::context::SwapperContext;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SwapService {
    registry: RegistryService,
    machines: MachineService,
}

impl SwapService {
    pub fn new(ctx: SwapperContext) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            machines: MachineService::new(ctx),
        }
    }

    /// Runs the whole swap workflow for `target`, reporting each step on `job`.
    ///
    /// # Errors
    /// * `InvalidArgument` - `target` is not a numeric id
    /// * `NotFound` - no participating VM has that id
    /// * `AlreadyOnline` - the target is the active VM; nothing is touched
    /// * any hypervisor failure of a step, which aborts the remaining steps
    pub async fn execute(&self, target: &str, job: &JobContext) -> SwapperResult<SwapOutcome> {
        let id = VmId::parse(target)?;

        // Live listing, not the cache: a refresh may lag behind a manual start.
        let machines = self.registry.live_listing().await?;
        let qm = machines
            .iter()
            .find(|vm| vm.id == id)
            .cloned()
            .ok_or(SwapperError::NotFound(id.get()))?;

        let running: Vec<&VirtualMachine> =
            machines.iter().filter(|vm| vm.status.is_active()).collect();
        if running.len() > 1 {
            warn!(
                active = ?running.iter().map(|vm| vm.id).collect::<Vec<_>>(),
                "more than one participating VM is running, stopping the first"
            );
        }
        let started = running.first().map(|vm| (*vm).clone());

        if started.as_ref().is_some_and(|vm| vm.id == qm.id) {
            return Err(SwapperError::AlreadyOnline(id.get()));
        }

        let report = |status: SwapStatus, started: Option<&VirtualMachine>| {
            job.progress(&Progress::Swap {
                status,
                meta: SwapMeta {
                    id: qm.id,
                    name: qm.name.clone(),
                    started: started.map(VirtualMachine::vm_ref),
                },
            });
        };

        report(SwapStatus::Initialise, None);
        info!(vmid = %qm.id, name = %qm.name, "executing swap request");

        if let Some(outgoing) = &started {
            report(SwapStatus::WaitingForStop, Some(outgoing));
            self.machines.shutdown(outgoing, job).await?;
            report(SwapStatus::MachineStop, Some(outgoing));

            report(SwapStatus::RemovingDevices, Some(outgoing));
            self.machines.remove_devices(outgoing).await?;
        }

        report(SwapStatus::DeviceAttach, None);
        let devices = self.machines.sync_devices(&qm).await?;

        report(SwapStatus::MachineStart, None);
        self.machines.start(&qm).await?;

        report(SwapStatus::Complete, None);
        Ok(SwapOutcome {
            target: qm.vm_ref(),
            stopped: started.as_ref().map(VirtualMachine::vm_ref),
            devices,
        })
    }
}
