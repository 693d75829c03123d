//! Notices hardware being plugged in or pulled out by diffing mapping snapshots.

use crate::core::domain::{
    error::SwapperResult,
    model::{cache_entry::mappings_key, device_mapping::DeviceMapping, job::ActiveJob},
    value_object::DeviceKind,
};
use crate::core::infrastructure::queue::{JobContext, Queue};
use crate::swapper::application::{
    response::{
        outcome::ChangeSet,
        progress::{DeviceEvent, DeviceEventKind, Progress},
    },
    service::mapping_service::MappingService,
};
use crate::swapper::context::SwapperContext;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ChangeDetectionService {
    ctx: SwapperContext,
    mappings: MappingService,
    active_queue: Queue<ActiveJob>,
}

impl ChangeDetectionService {
    pub fn new(ctx: SwapperContext, active_queue: Queue<ActiveJob>) -> Self {
        Self {
            mappings: MappingService::new(ctx.clone()),
            ctx,
            active_queue,
        }
    }

    /// One detection tick.
    ///
    /// A kind's snapshot is only rewritten when one of its mappings changed, and
    /// any change schedules a debounced device sync of the active VM.
    pub async fn execute(&self, job: &JobContext) -> SwapperResult<ChangeSet> {
        let mut changes = ChangeSet::default();

        for kind in [DeviceKind::Usb, DeviceKind::Pci] {
            let previous: Option<Vec<DeviceMapping>> = self.ctx.kv.get(mappings_key(kind)).await?;
            let current = self.mappings.mappings(kind).await?;
            let changed = diff_mappings(previous.as_deref(), &current);
            if changed.is_empty() {
                continue;
            }

            self.ctx.kv.set(mappings_key(kind), &current).await?;
            for mapping in &changed {
                let event = device_event(mapping);
                info!(device = %event.device, event = ?event.event, "host device change");
                job.progress(&Progress::Device(event.clone()));
                changes.events.push(event);
            }
            match kind {
                DeviceKind::Usb => changes.usb = changed,
                DeviceKind::Pci => changes.pci = changed,
            }
        }

        if changes.is_empty() {
            debug!("no host device changes");
        } else {
            let delay = self.ctx.options.device_sync_delay;
            let job_id = self.active_queue.add_delayed(ActiveJob::DeviceSync, delay)?;
            info!(job_id, delay_ms = delay.as_millis() as u64, "device sync scheduled");
        }
        Ok(changes)
    }
}

/// Mappings of `current` whose connectivity differs from `previous`.
///
/// A mapping absent from `previous` (or no previous snapshot at all) counts as changed.
#[must_use]
pub fn diff_mappings(previous: Option<&[DeviceMapping]>, current: &[DeviceMapping]) -> Vec<DeviceMapping> {
    current
        .iter()
        .filter(|mapping| {
            let before = previous.and_then(|previous| {
                previous
                    .iter()
                    .find(|old| old.change_key() == mapping.change_key())
            });
            before.is_none_or(|old| old.connected_to_host != mapping.connected_to_host)
        })
        .cloned()
        .collect()
}

fn device_event(mapping: &DeviceMapping) -> DeviceEvent {
    let event = match (mapping.kind, mapping.connected_to_host) {
        (DeviceKind::Usb, true) => DeviceEventKind::UsbDeviceAttach,
        (DeviceKind::Usb, false) => DeviceEventKind::UsbDeviceDetach,
        (DeviceKind::Pci, _) => DeviceEventKind::PciDeviceAttach,
    };
    DeviceEvent {
        event,
        device: mapping.change_key().to_string(),
        connected_to_host: mapping.connected_to_host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(id: &str, connected: bool) -> DeviceMapping {
        DeviceMapping {
            kind: DeviceKind::Usb,
            id: id.to_string(),
            dev_id: None,
            map: Vec::new(),
            description: None,
            connected_to_host: connected,
        }
    }

    #[test]
    fn test_diff_only_reports_flips() {
        let previous = vec![usb("keyboard", true), usb("mouse", false)];
        let current = vec![usb("keyboard", true), usb("mouse", true)];

        let changed = diff_mappings(Some(previous.as_slice()), &current);
        assert_eq!(changed, vec![usb("mouse", true)]);
        assert!(diff_mappings(Some(current.as_slice()), &current).is_empty());
    }

    #[test]
    fn test_unknown_mappings_count_as_changed() {
        let current = vec![usb("keyboard", false)];
        assert_eq!(diff_mappings(None, &current).len(), 1);
        assert_eq!(diff_mappings(Some(&[][..]), &current).len(), 1);
    }

    #[test]
    fn test_pci_events_are_attach_shaped() {
        let gpu = DeviceMapping {
            kind: DeviceKind::Pci,
            id: "gpu".to_string(),
            dev_id: Some("0000:01:00".to_string()),
            map: Vec::new(),
            description: None,
            connected_to_host: false,
        };
        let event = device_event(&gpu);
        assert_eq!(event.event, DeviceEventKind::PciDeviceAttach);
        assert_eq!(event.device, "0000:01:00");
        assert!(!event.connected_to_host);
    }
}
