//! Renders the job event stream as log lines.

use crate::core::infrastructure::queue::{EventBus, JobEvent};
use crate::swapper::application::response::progress::{
    ActiveJobStatus, DeviceEventKind, Progress, SwapStatus,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Spawns a task logging every event published on `events` until the bus is dropped.
pub fn spawn_log_listener(events: &EventBus) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log listener lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::Progress {
            queue,
            job_id,
            data,
        } => match serde_json::from_value::<Progress>(data.clone()) {
            Ok(Progress::Warning { meta, message }) => {
                warn!(queue, job_id, vmid = %meta.id, "[QM {}] {}", meta, message);
            }
            Ok(progress) => {
                if let Some(line) = describe(&progress) {
                    info!(queue, job_id, "{}", line);
                }
            }
            Err(_) => debug!(queue, job_id, %data, "progress"),
        },
        JobEvent::Completed { queue, job_id, .. } => {
            debug!(queue, job_id, "job completed");
        }
        JobEvent::Failed {
            queue,
            job_id,
            error,
        } => {
            error!(queue, job_id, "Error in {}: {}", queue, error);
        }
    }
}

/// Log line for a progress payload; `None` for steps not worth a line.
pub fn describe(progress: &Progress) -> Option<String> {
    match progress {
        Progress::Swap { status, meta } => {
            let prefix = format!("[QM {}: {}]", meta.id, meta.name);
            let started = meta
                .started
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            Some(match status {
                SwapStatus::Initialise => format!("{} Executing QM swap request", prefix),
                SwapStatus::WaitingForStop => {
                    format!("{} Waiting for QM {} to stop...", prefix, started)
                }
                SwapStatus::MachineStop => format!("{} Stopped QM {}", prefix, started),
                SwapStatus::RemovingDevices => {
                    format!("{} Removing devices from QM {}", prefix, started)
                }
                SwapStatus::DeviceAttach => format!("{} Attaching devices", prefix),
                SwapStatus::MachineStart => format!("{} Started QM", prefix),
                SwapStatus::Complete => format!("{} Swap complete", prefix),
            })
        }
        Progress::Active { job, status, meta } => Some(match status {
            ActiveJobStatus::Waiting => format!("[QM {}] Executing job {}", meta.id, job.title()),
            ActiveJobStatus::Complete => format!("[QM {}] Executed job {}", meta.id, job.title()),
        }),
        Progress::Device(event) => Some(match event.event {
            DeviceEventKind::UsbDeviceAttach => format!("[HOST] Attached USB device {}", event.device),
            DeviceEventKind::UsbDeviceDetach => format!("[HOST] Detached USB device {}", event.device),
            DeviceEventKind::PciDeviceAttach => format!(
                "[HOST] PCI device {} is {}",
                event.device,
                if event.connected_to_host {
                    "present"
                } else {
                    "gone"
                }
            ),
        }),
        Progress::Cache { .. } => None,
        Progress::Warning { meta, message } => Some(format!("[QM {}] {}", meta, message)),
    }
}
