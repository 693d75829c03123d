use crate::core::domain::model::{job::ActiveJob, vm::VmStatus};
use crate::core::infrastructure::queue::{EventBus, JobEvent};
use crate::swapper::application::{
    response::outcome::ActiveOutcome,
    service::{active_service::ActiveService, registry_service::RegistryService},
};
use crate::tests::fixtures::{FakeHypervisor, desk_description, job_context, test_context};
use std::sync::Arc;

async fn refreshed(fake: &Arc<FakeHypervisor>) -> ActiveService {
    let ctx = test_context(fake.clone());
    RegistryService::new(ctx.clone()).update_cache().await.unwrap();
    ActiveService::new(ctx)
}

fn desk_with_stale_keyboard(base: FakeHypervisor) -> Arc<FakeHypervisor> {
    let fake = base
        .with_vm(100, "windows", "swapper", VmStatus::Running, &desk_description("windows"))
        .with_usb_mapping("keyboard", "046d:c52b");
    // attached earlier, since unplugged
    fake.set_config(100, "usb0", "mapping=keyboard");
    Arc::new(fake)
}

#[tokio::test]
async fn test_no_active_vm_is_reported_not_raised() {
    let fake = Arc::new(FakeHypervisor::new().with_vm(
        100,
        "windows",
        "swapper",
        VmStatus::Stopped,
        "",
    ));
    let service = refreshed(&fake).await;

    for kind in [ActiveJob::DeviceSync, ActiveJob::Stop, ActiveJob::HangingStop] {
        let outcome = service.execute(kind, &job_context(&EventBus::new())).await.unwrap();
        assert_eq!(outcome, ActiveOutcome::NoActiveVm);
    }
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_stop_removes_devices_even_when_shutdown_fails() {
    let fake = desk_with_stale_keyboard(FakeHypervisor::new().rejecting_shutdown());
    let service = refreshed(&fake).await;

    let outcome = service
        .execute(ActiveJob::Stop, &job_context(&EventBus::new()))
        .await
        .unwrap();

    let ActiveOutcome::Completed {
        devices,
        shutdown_error,
        ..
    } = outcome
    else {
        panic!("expected a completed stop");
    };
    assert!(shutdown_error.unwrap().contains("guest agent"));
    assert_eq!(devices.unwrap().removed, vec!["usb0".to_string()]);
    assert_eq!(fake.calls(), vec!["shutdown:100", "delete:100:usb0"]);
    assert!(!fake.config(100).contains_key("usb0"));
}

#[tokio::test]
async fn test_stop_escalates_to_halt_when_guest_ignores_shutdown() {
    let fake = Arc::new(
        FakeHypervisor::new()
            .with_vm(100, "windows", "swapper", VmStatus::Running, "")
            .ignoring_shutdown(),
    );
    let service = refreshed(&fake).await;

    let events = EventBus::new();
    let mut progress = events.subscribe();
    let outcome = service
        .execute(ActiveJob::Stop, &job_context(&events))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ActiveOutcome::Completed {
            shutdown_error: None,
            ..
        }
    ));
    assert_eq!(fake.calls(), vec!["shutdown:100", "stop:100"]);
    assert_eq!(fake.status(100), VmStatus::Stopped);

    let mut warned = false;
    while let Ok(event) = progress.try_recv() {
        if let JobEvent::Progress { data, .. } = event {
            warned |= data["kind"] == "warning";
        }
    }
    assert!(warned);
}

#[tokio::test]
async fn test_hanging_stop_halts_immediately() {
    let fake = desk_with_stale_keyboard(FakeHypervisor::new());
    let service = refreshed(&fake).await;

    service
        .execute(ActiveJob::HangingStop, &job_context(&EventBus::new()))
        .await
        .unwrap();
    assert_eq!(fake.calls(), vec!["stop:100"]);
}

#[tokio::test]
async fn test_device_sync_attaches_replugged_hardware() {
    let fake = desk_with_stale_keyboard(FakeHypervisor::new());
    let service = refreshed(&fake).await;

    let outcome = service
        .execute(ActiveJob::DeviceSync, &job_context(&EventBus::new()))
        .await
        .unwrap();
    let ActiveOutcome::Completed { devices, .. } = outcome else {
        panic!("expected a completed sync");
    };
    assert_eq!(devices.unwrap().removed, vec!["usb0".to_string()]);

    fake.plug_usb("046d:c52b");
    service
        .execute(ActiveJob::DeviceSync, &job_context(&EventBus::new()))
        .await
        .unwrap();
    assert_eq!(fake.config(100)["usb0"], "mapping=keyboard");
    assert_eq!(fake.calls().last().map(String::as_str), Some("set:100:usb0"));
}
