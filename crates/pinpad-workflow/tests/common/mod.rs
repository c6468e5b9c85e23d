//! Shared fixtures for workflow integration tests.

#![allow(dead_code)]

use pinpad_core::{DalConfiguration, Manufacturer, ManufacturerSection};
use pinpad_hardware::simulator::{CallJournal, SIMULATOR_MODEL, SimulatorDevice, SimulatorHandle};
use pinpad_hardware::{AnyPaymentDevice, DeviceInformation};
use pinpad_workflow::{
    DalSession, MemoryPublisher, MemoryStateStore, StaticDeviceLoader, UploadLauncher,
    WorkflowContext,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Session wired to in-memory collaborators.
pub struct Harness {
    pub session: DalSession,
    pub store: Arc<MemoryStateStore>,
    pub publisher: Arc<MemoryPublisher>,
}

impl Harness {
    pub fn new(configuration: DalConfiguration, templates: Vec<AnyPaymentDevice>) -> Self {
        Self::build(configuration, templates, None)
    }

    pub fn with_launcher(
        configuration: DalConfiguration,
        templates: Vec<AnyPaymentDevice>,
        launcher: Arc<dyn UploadLauncher>,
    ) -> Self {
        Self::build(configuration, templates, Some(launcher))
    }

    fn build(
        configuration: DalConfiguration,
        templates: Vec<AnyPaymentDevice>,
        launcher: Option<Arc<dyn UploadLauncher>>,
    ) -> Self {
        let store = Arc::new(MemoryStateStore::new());
        let publisher = Arc::new(MemoryPublisher::new());

        let mut builder = WorkflowContext::builder(configuration)
            .with_loader(Arc::new(StaticDeviceLoader::new(templates)))
            .with_store(store.clone())
            .with_publisher(publisher.clone());
        if let Some(launcher) = launcher {
            builder = builder.with_upload_launcher(launcher);
        }

        Self {
            session: DalSession::new(builder.build()),
            store,
            publisher,
        }
    }
}

/// Section approving the simulator model.
pub fn section(sort_order: i32) -> ManufacturerSection {
    ManufacturerSection::new(sort_order).with_supported_devices([SIMULATOR_MODEL])
}

pub fn unit(manufacturer: Manufacturer, serial: &str) -> DeviceInformation {
    DeviceInformation::new(manufacturer, SIMULATOR_MODEL, serial).with_firmware_version("1.0.0")
}

/// Simulator impersonating `manufacturer` with one unit per serial.
pub fn simulator(
    manufacturer: Manufacturer,
    serials: &[&str],
    journal: &CallJournal,
) -> (AnyPaymentDevice, SimulatorHandle) {
    let units = serials.iter().map(|s| unit(manufacturer, s)).collect();
    let (device, handle) = SimulatorDevice::with_journal(manufacturer, units, journal.clone());
    (device.into(), handle)
}

/// Single simulator unit `SIM-0001`, enabled at sort order 1.
pub fn single_device() -> (DalConfiguration, Vec<AnyPaymentDevice>, SimulatorHandle) {
    let journal = CallJournal::new();
    let (device, handle) = simulator(Manufacturer::Simulator, &["SIM-0001"], &journal);
    let configuration =
        DalConfiguration::default().with_manufacturer(Manufacturer::Simulator, section(1));
    (configuration, vec![device], handle)
}

/// Upload launcher that records staged artifacts instead of spawning.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<PathBuf>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }
}

impl UploadLauncher for RecordingLauncher {
    fn launch(&self, _command: &[String], artifact: &Path) -> pinpad_workflow::Result<()> {
        self.launched.lock().unwrap().push(artifact.to_path_buf());
        Ok(())
    }
}
