//! Discovery and probe pipeline behaviour.

mod common;

use common::{Harness, section, simulator, unit};
use pinpad_core::{DalConfiguration, Manufacturer, ManufacturerSection};
use pinpad_hardware::simulator::{CallJournal, SimulatorCall};
use pinpad_hardware::{
    AnyPaymentDevice, DeviceEventChannel, DeviceInformation, HardwareError, NullDevice,
};
use pinpad_workflow::actions::discover_and_probe;
use pinpad_workflow::{
    DalSession, ManifestDeviceLoader, StaticDeviceLoader, WorkflowContext, WorkflowError,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn probed_serials(calls: Vec<SimulatorCall>) -> Vec<String> {
    calls
        .into_iter()
        .filter_map(|call| call.serial_number)
        .collect()
}

#[tokio::test]
async fn test_probe_order_follows_sort_order() {
    let journal = CallJournal::new();
    let (verifone, _) = simulator(Manufacturer::Verifone, &["V-1"], &journal);
    let (idtech, idtech_handle) = simulator(Manufacturer::IdTech, &["I-1"], &journal);
    let (simulated, _) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    let configuration = DalConfiguration::default()
        .with_manufacturer(Manufacturer::Verifone, section(2))
        .with_manufacturer(Manufacturer::IdTech, ManufacturerSection::disabled())
        .with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![verifone, idtech, simulated]);
    let report = harness.session.start().await.unwrap();

    assert_eq!(
        probed_serials(journal.calls_for("probe").await),
        vec!["S-1".to_string(), "V-1".to_string()]
    );
    assert_eq!(idtech_handle.call_count("discover_devices").await, 0);

    let accepted: Vec<_> = report
        .accepted
        .iter()
        .map(|info| info.serial_number.as_str())
        .collect();
    assert_eq!(accepted, vec!["S-1", "V-1"]);
    assert!(report.exceptions.is_empty());
}

#[tokio::test]
async fn test_equal_sort_orders_keep_load_order() {
    let journal = CallJournal::new();
    let (verifone, _) = simulator(Manufacturer::Verifone, &["V-1"], &journal);
    let (idtech, _) = simulator(Manufacturer::IdTech, &["I-1"], &journal);
    let configuration = DalConfiguration::default()
        .with_manufacturer(Manufacturer::Verifone, section(1))
        .with_manufacturer(Manufacturer::IdTech, section(1));

    let harness = Harness::new(configuration, vec![verifone, idtech]);
    harness.session.start().await.unwrap();

    assert_eq!(
        probed_serials(journal.calls_for("probe").await),
        vec!["V-1".to_string(), "I-1".to_string()]
    );
}

#[tokio::test]
async fn test_all_probes_failing_leaves_no_targets() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1", "S-2"], &journal);
    handle
        .fail_probe(HardwareError::communication("no answer on port"))
        .await;
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![device]);
    let result = harness.session.start().await;

    match result {
        Err(WorkflowError::NoValidDevice(message)) => {
            assert!(message.contains("no valid device found"));
            assert!(message.contains("S-1"));
            assert!(message.contains("S-2"));
        }
        other => panic!("expected NoValidDevice, got {other:?}"),
    }
    assert!(!harness.session.is_started());
    assert!(harness.session.target_devices().await.is_empty());
    assert_eq!(handle.attached_units(), 0);
    assert_eq!(handle.call_count("disconnect").await, 2);
}

#[tokio::test]
async fn test_inactive_unit_is_skipped() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1", "S-2"], &journal);
    handle.mark_inactive("S-1").await;
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![device]);
    let report = harness.session.start().await.unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.accepted[0].serial_number, "S-2");
    assert_eq!(report.exceptions.len(), 1);
    assert!(report.exceptions[0].message.contains("S-1"));
    assert_eq!(handle.attached_units(), 1);
}

#[tokio::test]
async fn test_unapproved_model_is_dropped() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    handle
        .add_unit(DeviceInformation::new(Manufacturer::Simulator, "SIM-9999", "S-2"))
        .await;
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![device]);
    let report = harness.session.start().await.unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.accepted[0].serial_number, "S-1");

    let idled = probed_serials(journal.calls_for("set_idle").await);
    assert!(idled.contains(&"S-2".to_string()));
    let released = probed_serials(journal.calls_for("disconnect").await);
    assert_eq!(released, vec!["S-2".to_string()]);
    assert_eq!(handle.attached_units(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_times_out() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    handle.delay_probe(Duration::from_secs(60)).await;
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![device]);
    let result = harness.session.start().await;

    match result {
        Err(WorkflowError::NoValidDevice(message)) => assert!(message.contains("timed out")),
        other => panic!("expected NoValidDevice, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_probe_still_releases_unit() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    handle.delay_probe(Duration::from_secs(60)).await;
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));
    let loader = StaticDeviceLoader::new(vec![device]);
    let events = DeviceEventChannel::new();
    let cancel = CancellationToken::new();

    let (outcome, ()) = tokio::join!(
        discover_and_probe(
            &loader,
            &configuration.plugin_path,
            &configuration,
            &events,
            &cancel,
        ),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        },
    );

    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.exceptions.len(), 1);
    assert!(outcome.exceptions[0].message.contains("cancelled"));
    assert_eq!(handle.call_count("probe").await, 1);
    assert_eq!(handle.call_count("disconnect").await, 1);
    assert_eq!(handle.attached_units(), 0);
}

#[tokio::test]
async fn test_discovery_failure_does_not_stop_other_manufacturers() {
    let journal = CallJournal::new();
    let (verifone, verifone_handle) = simulator(Manufacturer::Verifone, &["V-1"], &journal);
    verifone_handle
        .fail_discovery(HardwareError::initialization_failed("usb bus unavailable"))
        .await;
    let (idtech, _) = simulator(Manufacturer::IdTech, &["I-1"], &journal);
    let configuration = DalConfiguration::default()
        .with_manufacturer(Manufacturer::Verifone, section(1))
        .with_manufacturer(Manufacturer::IdTech, section(2));

    let harness = Harness::new(configuration, vec![verifone, idtech]);
    let report = harness.session.start().await.unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.accepted[0].manufacturer, Manufacturer::IdTech);
    assert_eq!(report.exceptions.len(), 1);
    assert!(report.exceptions[0].message.contains("Verifone discovery"));
}

#[tokio::test]
async fn test_no_device_plugin_is_skipped() {
    let journal = CallJournal::new();
    let (device, _) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    let configuration = DalConfiguration::default()
        .with_manufacturer(Manufacturer::NoDevice, ManufacturerSection::new(0))
        .with_manufacturer(Manufacturer::Simulator, section(1));
    let templates = vec![
        AnyPaymentDevice::from(NullDevice::new(Manufacturer::NoDevice)),
        device,
    ];

    let harness = Harness::new(configuration, templates);
    let report = harness.session.start().await.unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert!(report.exceptions.is_empty());
}

#[tokio::test]
async fn test_accepted_devices_get_status_and_idle() {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["S-1"], &journal);
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));

    let harness = Harness::new(configuration, vec![device]);
    harness.session.start().await.unwrap();

    assert_eq!(handle.call_count("get_status").await, 1);
    assert_eq!(handle.call_count("set_idle").await, 1);
    assert_eq!(harness.session.target_devices().await.len(), 1);
}

#[tokio::test]
async fn test_manifest_plugins_drive_discovery() {
    let plugins = TempDir::new().unwrap();
    let verifone = unit(Manufacturer::Verifone, "275-330-181");
    let manifest = serde_json::json!({
        "manufacturer": "Verifone",
        "driver": "simulator",
        "units": [verifone],
    });
    std::fs::write(
        plugins.path().join("10-verifone.plugin.json"),
        manifest.to_string(),
    )
    .unwrap();
    std::fs::write(
        plugins.path().join("20-none.plugin.json"),
        r#"{"manufacturer": "NoDevice", "driver": "none"}"#,
    )
    .unwrap();

    let mut configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Verifone, section(1));
    configuration.plugin_path = plugins.path().to_path_buf();

    let journal = CallJournal::new();
    let context = WorkflowContext::builder(configuration)
        .with_loader(Arc::new(ManifestDeviceLoader::new().with_journal(journal.clone())))
        .build();
    let session = DalSession::new(context);
    let report = session.start().await.unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.accepted[0].serial_number, "275-330-181");
    assert_eq!(journal.calls_for("probe").await.len(), 1);
}

#[tokio::test]
async fn test_missing_plugin_directory_fails_start() {
    let mut configuration = DalConfiguration::default()
        .with_manufacturer(Manufacturer::Simulator, section(1));
    configuration.plugin_path = "/nonexistent/pinpad/plugins".into();

    let session = DalSession::new(WorkflowContext::builder(configuration).build());
    let result = session.start().await;

    match result {
        Err(WorkflowError::NoValidDevice(message)) => {
            assert!(message.contains("failed to load device plugins"));
        }
        other => panic!("expected NoValidDevice, got {other:?}"),
    }
}
