use crate::core::domain::{
    error::SwapperError,
    model::{
        cluster_resource::{ClusterResource, QemuResource},
        device_mapping::{RawMapping, UsbHardware},
        vm::{VmConfigMap, VmStatus},
    },
    value_object::{DeviceKind, VmId},
};
use crate::core::infrastructure::{hypervisor::MockHypervisor, queue::EventBus};
use crate::swapper::application::service::swap_service::SwapService;
use crate::tests::fixtures::{
    FakeHypervisor, NODE, description, desk_description, job_context, test_context,
};
use mockall::{Sequence, predicate::*};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn resource(id: u32, name: &str, status: VmStatus) -> ClusterResource {
    ClusterResource::Qemu(QemuResource {
        vmid: id,
        node: NODE.to_string(),
        name: Some(name.to_string()),
        status,
        tags: Some("swapper".to_string()),
        template: None,
        uptime: None,
    })
}

fn config(name: &str, devices: serde_json::Value, attached: &[(&str, &str)]) -> VmConfigMap {
    let mut config = json!({
        "name": name,
        "tags": "swapper",
        "description": description(json!({"name": name, "devices": devices})),
    })
    .as_object()
    .cloned()
    .unwrap();
    for (slot, value) in attached {
        config.insert(slot.to_string(), json!(value));
    }
    config
}

fn listing_mock() -> MockHypervisor {
    let mut mock = MockHypervisor::new();
    mock.expect_vm_resources().returning(|| {
        Ok(vec![
            resource(100, "windows", VmStatus::Running),
            resource(101, "linux", VmStatus::Stopped),
        ])
    });
    mock
}

#[tokio::test]
async fn test_swap_orders_stop_remove_attach_start() {
    let mut mock = listing_mock();

    let configs: HashMap<u32, VmConfigMap> = HashMap::from([
        (
            100,
            config(
                "windows",
                json!([
                    {"type": "usb", "as": "usb0", "value": "mapping=keyboard"},
                    {"type": "usb", "as": "usb1", "value": "mapping=mouse"}
                ]),
                &[("usb0", "mapping=keyboard"), ("usb1", "mapping=mouse")],
            ),
        ),
        (
            101,
            config(
                "linux",
                json!([{"type": "usb", "as": "usb0", "value": "mapping=keyboard"}]),
                &[],
            ),
        ),
    ]);
    mock.expect_vm_config()
        .returning(move |_, vmid| Ok(configs[&vmid.get()].clone()));
    mock.expect_vm_status()
        .returning(|_, _| Ok(serde_json::from_value(json!({"status": "stopped"})).unwrap()));
    mock.expect_mappings().returning(|kind| {
        Ok(match kind {
            DeviceKind::Usb => vec![
                RawMapping {
                    id: "keyboard".to_string(),
                    description: None,
                    map: vec!["id=046d:c52b,node=pve1".to_string()],
                },
                RawMapping {
                    id: "mouse".to_string(),
                    description: None,
                    map: vec!["id=046d:c077,node=pve1".to_string()],
                },
            ],
            DeviceKind::Pci => Vec::new(),
        })
    });
    mock.expect_usb_hardware().returning(|_| {
        Ok(vec![UsbHardware {
            vendid: "046d".to_string(),
            prodid: "c52b".to_string(),
            product: Some("Unifying Receiver".to_string()),
            manufacturer: None,
            busnum: None,
            devnum: None,
        }])
    });

    let mut seq = Sequence::new();
    mock.expect_shutdown_vm()
        .with(always(), eq(VmId::new(100)), eq(true), always())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, _| Ok(()));
    mock.expect_delete_vm_devices()
        .withf(|_, vmid, slots| *vmid == VmId::new(100) && slots == ["usb1".to_string()])
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    mock.expect_set_vm_devices()
        .withf(|_, vmid, devices| {
            *vmid == VmId::new(101)
                && devices.get("usb0").map(String::as_str) == Some("mapping=keyboard")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    mock.expect_start_vm()
        .with(always(), eq(VmId::new(101)))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let events = EventBus::new();
    let service = SwapService::new(test_context(Arc::new(mock)));
    let outcome = service.execute("101", &job_context(&events)).await.unwrap();

    assert_eq!(outcome.target.id, VmId::new(101));
    assert_eq!(outcome.stopped.map(|vm| vm.id), Some(VmId::new(100)));
    assert_eq!(outcome.devices.attached, vec!["usb0".to_string()]);
}

#[tokio::test]
async fn test_swap_to_active_vm_is_rejected_without_power_calls() {
    // No shutdown or start expectations: any such call panics the mock.
    let mock = listing_mock();
    let service = SwapService::new(test_context(Arc::new(mock)));

    let result = service.execute("100", &job_context(&EventBus::new())).await;
    assert!(matches!(result, Err(SwapperError::AlreadyOnline(100))));
}

#[tokio::test]
async fn test_swap_to_unknown_vm() {
    let service = SwapService::new(test_context(Arc::new(listing_mock())));

    let result = service.execute("999", &job_context(&EventBus::new())).await;
    assert!(matches!(result, Err(SwapperError::NotFound(999))));
}

#[tokio::test]
async fn test_swap_with_malformed_id_never_calls_the_hypervisor() {
    let service = SwapService::new(test_context(Arc::new(MockHypervisor::new())));

    let result = service.execute("abc", &job_context(&EventBus::new())).await;
    assert!(matches!(result, Err(SwapperError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_swap_moves_devices_between_vms() {
    let fake = Arc::new(
        FakeHypervisor::new()
            .with_vm(100, "windows", "swapper", VmStatus::Running, &desk_description("windows"))
            .with_vm(101, "linux", "swapper", VmStatus::Stopped, &desk_description("linux"))
            .with_usb_mapping("keyboard", "046d:c52b")
            .with_pci_mapping("gpu", "0000:01:00"),
    );
    fake.plug_usb("046d:c52b");
    fake.plug_pci("0000:01:00");

    let events = EventBus::new();
    let mut progress = events.subscribe();
    let service = SwapService::new(test_context(fake.clone()));
    service.execute("101", &job_context(&events)).await.unwrap();

    assert_eq!(fake.status(100), VmStatus::Stopped);
    assert_eq!(fake.status(101), VmStatus::Running);
    let linux = fake.config(101);
    assert_eq!(linux["usb0"], json!("mapping=keyboard"));
    assert_eq!(linux["hostpci0"], json!("mapping=gpu,pcie=1"));

    let calls = fake.calls();
    assert_eq!(calls.first().map(String::as_str), Some("shutdown:100"));
    assert_eq!(calls.last().map(String::as_str), Some("start:101"));

    let mut steps = 0;
    while progress.try_recv().is_ok() {
        steps += 1;
    }
    // Initialise, WaitingForStop, MachineStop, RemovingDevices, DeviceAttach, MachineStart, Complete
    assert_eq!(steps, 7);
}

#[tokio::test]
async fn test_swap_without_running_vm_only_starts_target() {
    let fake = Arc::new(
        FakeHypervisor::new()
            .with_vm(100, "windows", "swapper", VmStatus::Stopped, &desk_description("windows"))
            .with_usb_mapping("keyboard", "046d:c52b"),
    );
    fake.plug_usb("046d:c52b");

    let service = SwapService::new(test_context(fake.clone()));
    let outcome = service
        .execute("100", &job_context(&EventBus::new()))
        .await
        .unwrap();

    assert!(outcome.stopped.is_none());
    assert_eq!(fake.calls(), vec!["set:100:usb0", "start:100"]);
}
