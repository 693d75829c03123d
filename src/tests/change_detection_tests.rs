use crate::core::domain::model::job::{ACTIVE_QUEUE, ActiveJob};
use crate::core::infrastructure::{
    kv_store::KvStore,
    queue::{EventBus, Queue, QueueReceiver},
};
use crate::swapper::application::{
    response::progress::DeviceEventKind,
    service::change_detection_service::ChangeDetectionService,
};
use crate::swapper::context::SwapperContext;
use crate::tests::fixtures::{CountingKvStore, FakeHypervisor, job_context, test_options};
use std::sync::Arc;

struct Harness {
    fake: Arc<FakeHypervisor>,
    kv: Arc<CountingKvStore>,
    detector: ChangeDetectionService,
    active: QueueReceiver<ActiveJob>,
    events: EventBus,
}

fn harness() -> Harness {
    let fake = Arc::new(
        FakeHypervisor::new()
            .with_usb_mapping("keyboard", "046d:c52b")
            .with_usb_mapping("mouse", "046d:c077")
            .with_pci_mapping("gpu", "0000:01:00"),
    );
    fake.plug_pci("0000:01:00");
    let kv = Arc::new(CountingKvStore::default());
    let ctx = SwapperContext::new(fake.clone(), kv.clone() as Arc<dyn KvStore>, test_options());
    let (queue, active) = Queue::new(ACTIVE_QUEUE);
    Harness {
        fake,
        kv,
        detector: ChangeDetectionService::new(ctx, queue),
        active,
        events: EventBus::new(),
    }
}

fn drain(receiver: &mut QueueReceiver<ActiveJob>) -> Vec<ActiveJob> {
    let mut jobs = Vec::new();
    while let Some(job) = receiver.try_recv() {
        jobs.push(job.payload);
    }
    jobs
}

#[tokio::test]
async fn test_first_tick_reports_every_mapping() {
    let mut h = harness();

    let changes = h.detector.execute(&job_context(&h.events)).await.unwrap();
    assert_eq!(changes.usb.len(), 2);
    assert_eq!(changes.pci.len(), 1);
    assert_eq!(changes.events.len(), 3);
    assert_eq!(h.kv.writes(), 2);
    assert_eq!(drain(&mut h.active), vec![ActiveJob::DeviceSync]);
}

#[tokio::test]
async fn test_single_plug_gives_one_event_and_one_resync() {
    let mut h = harness();
    h.detector.execute(&job_context(&h.events)).await.unwrap();
    drain(&mut h.active);
    let writes = h.kv.writes();

    h.fake.plug_usb("046d:c52b");
    let changes = h.detector.execute(&job_context(&h.events)).await.unwrap();

    assert_eq!(changes.events.len(), 1);
    assert_eq!(changes.events[0].event, DeviceEventKind::UsbDeviceAttach);
    assert_eq!(changes.events[0].device, "keyboard");
    assert!(changes.pci.is_empty());
    // only the USB snapshot is rewritten
    assert_eq!(h.kv.writes(), writes + 1);
    assert_eq!(drain(&mut h.active), vec![ActiveJob::DeviceSync]);

    h.fake.unplug_usb("046d:c52b");
    let changes = h.detector.execute(&job_context(&h.events)).await.unwrap();
    assert_eq!(changes.events.len(), 1);
    assert_eq!(changes.events[0].event, DeviceEventKind::UsbDeviceDetach);
    assert_eq!(drain(&mut h.active).len(), 1);
}

#[tokio::test]
async fn test_identical_snapshots_change_nothing() {
    let mut h = harness();
    h.detector.execute(&job_context(&h.events)).await.unwrap();
    drain(&mut h.active);
    let writes = h.kv.writes();

    let mut progress = h.events.subscribe();
    let changes = h.detector.execute(&job_context(&h.events)).await.unwrap();

    assert!(changes.is_empty());
    assert!(changes.events.is_empty());
    assert_eq!(h.kv.writes(), writes);
    assert!(drain(&mut h.active).is_empty());
    assert!(progress.try_recv().is_err());
}
