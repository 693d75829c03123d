use crate::core::domain::{error::SwapperResult, model::job::ActiveJob};
use crate::core::infrastructure::queue::JobContext;
use crate::swapper::application::{
    response::{
        outcome::ActiveOutcome,
        progress::{ActiveJobStatus, Progress},
    },
    service::{machine_service::MachineService, registry_service::RegistryService},
};
use crate::swapper::context::SwapperContext;
use tracing::{info, warn};

/// Point operations against the head of the active set.
#[derive(Debug, Clone)]
pub struct ActiveService {
    registry: RegistryService,
    machines: MachineService,
}

impl ActiveService {
    pub fn new(ctx: SwapperContext) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            machines: MachineService::new(ctx),
        }
    }

    pub async fn execute(&self, kind: ActiveJob, job: &JobContext) -> SwapperResult<ActiveOutcome> {
        let Some(active) = self.registry.active().await? else {
            info!(job = kind.title(), "no active QM, nothing to do");
            return Ok(ActiveOutcome::NoActiveVm);
        };
        let meta = active.vm_ref();
        let report = |status| {
            job.progress(&Progress::Active {
                job: kind,
                status,
                meta: meta.clone(),
            });
        };

        report(ActiveJobStatus::Waiting);
        let (devices, shutdown_error) = match kind {
            ActiveJob::DeviceSync => (Some(self.machines.sync_devices(&active).await?), None),
            ActiveJob::Stop => {
                // Cleanup runs even when the shutdown request fails.
                let shutdown_error = match self.machines.shutdown(&active, job).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(vmid = %active.id, error = %e, "shutdown failed, removing devices anyway");
                        job.progress(&Progress::Warning {
                            meta: meta.clone(),
                            message: format!("Shutdown failed: {}", e),
                        });
                        Some(e.to_string())
                    }
                };
                (Some(self.machines.remove_devices(&active).await?), shutdown_error)
            }
            ActiveJob::HangingStop => {
                self.machines.halt(&active).await?;
                (None, None)
            }
        };
        report(ActiveJobStatus::Complete);

        Ok(ActiveOutcome::Completed {
            job: kind,
            vm: meta.clone(),
            devices,
            shutdown_error,
        })
    }
}
