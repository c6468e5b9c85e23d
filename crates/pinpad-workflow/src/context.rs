//! Session-wide collaborators shared by every controller.
//!
//! [`WorkflowContext`] bundles the configuration, the plugin loader, the
//! target device set and the outbound collaborators. It is cheap to clone;
//! every controller created by a session works on the same device set.

use crate::broker::CancellationBroker;
use crate::loader::{DeviceLoader, ManifestDeviceLoader};
use crate::publisher::{MemoryPublisher, ResponsePublisher};
use crate::sftp::{SftpHandoff, UploadLauncher};
use crate::store::{JsonFileStateStore, MemoryStateStore, StateStore};
use pinpad_core::{DalConfiguration, DeviceIdentifier};
use pinpad_hardware::{AnyPaymentDevice, DeviceEventChannel, DeviceInformation};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// A probed device accepted into the target set.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    information: DeviceInformation,
    device: Arc<Mutex<AnyPaymentDevice>>,
}

impl DeviceHandle {
    pub fn new(information: DeviceInformation, device: AnyPaymentDevice) -> Self {
        Self {
            information,
            device: Arc::new(Mutex::new(device)),
        }
    }

    pub fn information(&self) -> &DeviceInformation {
        &self.information
    }

    pub fn identifier(&self) -> DeviceIdentifier {
        self.information.identifier()
    }

    /// Shared handle to the driver; lock it for the duration of one call.
    pub fn device(&self) -> Arc<Mutex<AnyPaymentDevice>> {
        Arc::clone(&self.device)
    }
}

/// Ordered set of target devices.
///
/// Written by discovery and shutdown; read by every request.
#[derive(Debug, Clone, Default)]
pub struct TargetDeviceSet {
    devices: Arc<RwLock<Vec<DeviceHandle>>>,
}

impl TargetDeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current devices, in acceptance order.
    pub async fn snapshot(&self) -> Vec<DeviceHandle> {
        self.devices.read().await.clone()
    }

    pub async fn replace(&self, devices: Vec<DeviceHandle>) {
        *self.devices.write().await = devices;
    }

    /// Remove and return every device.
    pub async fn take(&self) -> Vec<DeviceHandle> {
        std::mem::take(&mut *self.devices.write().await)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Devices matching `identifier`, or every device when it is absent.
    pub async fn resolve(&self, identifier: Option<&DeviceIdentifier>) -> Vec<DeviceHandle> {
        let devices = self.devices.read().await;
        match identifier {
            None => devices.clone(),
            Some(wanted) => devices
                .iter()
                .filter(|handle| wanted.matches(&handle.identifier()))
                .cloned()
                .collect(),
        }
    }
}

/// Collaborators shared by a session and all of its controllers.
#[derive(Clone)]
pub struct WorkflowContext {
    configuration: Arc<DalConfiguration>,
    loader: Arc<dyn DeviceLoader>,
    store: Arc<dyn StateStore>,
    publisher: Arc<dyn ResponsePublisher>,
    sftp: Option<SftpHandoff>,
    targets: TargetDeviceSet,
    events: DeviceEventChannel,
    broker: CancellationBroker,
    session_token: CancellationToken,
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("configuration", &self.configuration)
            .field("targets", &self.targets)
            .field("sftp", &self.sftp)
            .finish_non_exhaustive()
    }
}

impl WorkflowContext {
    /// Start building a context for `configuration`.
    pub fn builder(configuration: DalConfiguration) -> WorkflowContextBuilder {
        WorkflowContextBuilder::new(configuration)
    }

    pub fn configuration(&self) -> &DalConfiguration {
        &self.configuration
    }

    pub fn plugin_path(&self) -> &std::path::Path {
        &self.configuration.plugin_path
    }

    pub fn loader(&self) -> &dyn DeviceLoader {
        self.loader.as_ref()
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn publisher(&self) -> &dyn ResponsePublisher {
        self.publisher.as_ref()
    }

    pub fn sftp(&self) -> Option<&SftpHandoff> {
        self.sftp.as_ref()
    }

    pub fn targets(&self) -> &TargetDeviceSet {
        &self.targets
    }

    pub fn events(&self) -> &DeviceEventChannel {
        &self.events
    }

    pub fn broker(&self) -> CancellationBroker {
        self.broker
    }

    pub fn session_token(&self) -> &CancellationToken {
        &self.session_token
    }
}

/// Builder for [`WorkflowContext`].
///
/// Defaults: [`ManifestDeviceLoader`], a JSON file store when the
/// configuration names a state file (in-memory otherwise), an in-memory
/// publisher, and a process launcher for uploads when SFTP is configured.
pub struct WorkflowContextBuilder {
    configuration: DalConfiguration,
    loader: Option<Arc<dyn DeviceLoader>>,
    store: Option<Arc<dyn StateStore>>,
    publisher: Option<Arc<dyn ResponsePublisher>>,
    launcher: Option<Arc<dyn UploadLauncher>>,
    events: Option<DeviceEventChannel>,
    session_token: Option<CancellationToken>,
}

impl WorkflowContextBuilder {
    fn new(configuration: DalConfiguration) -> Self {
        Self {
            configuration,
            loader: None,
            store: None,
            publisher: None,
            launcher: None,
            events: None,
            session_token: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DeviceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ResponsePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_upload_launcher(mut self, launcher: Arc<dyn UploadLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_events(mut self, events: DeviceEventChannel) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_session_token(mut self, token: CancellationToken) -> Self {
        self.session_token = Some(token);
        self
    }

    pub fn build(self) -> WorkflowContext {
        let store = self.store.unwrap_or_else(|| match &self.configuration.state_file {
            Some(path) => Arc::new(JsonFileStateStore::new(path.clone())) as Arc<dyn StateStore>,
            None => Arc::new(MemoryStateStore::new()),
        });

        let sftp = self.configuration.sftp.clone().map(|settings| match self.launcher {
            Some(launcher) => SftpHandoff::new(settings, launcher),
            None => SftpHandoff::with_process_launcher(settings),
        });

        WorkflowContext {
            configuration: Arc::new(self.configuration),
            loader: self
                .loader
                .unwrap_or_else(|| Arc::new(ManifestDeviceLoader::new())),
            store,
            publisher: self
                .publisher
                .unwrap_or_else(|| Arc::new(MemoryPublisher::new())),
            sftp,
            targets: TargetDeviceSet::new(),
            events: self.events.unwrap_or_default(),
            broker: CancellationBroker::new(),
            session_token: self.session_token.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpad_core::{Manufacturer, SftpSettings};
    use pinpad_hardware::simulator::SimulatorDevice;

    fn handle(serial: &str) -> DeviceHandle {
        let info = DeviceInformation::new(Manufacturer::Simulator, "SIM-1000", serial);
        let (device, _) = SimulatorDevice::new();
        DeviceHandle::new(info, AnyPaymentDevice::Simulator(device))
    }

    #[tokio::test]
    async fn test_resolve_without_identifier_returns_all() {
        let targets = TargetDeviceSet::new();
        targets.replace(vec![handle("A"), handle("B")]).await;

        assert_eq!(targets.resolve(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_by_serial() {
        let targets = TargetDeviceSet::new();
        targets.replace(vec![handle("A"), handle("B")]).await;

        let wanted = DeviceIdentifier {
            serial_number: Some("b".to_string()),
            ..Default::default()
        };
        let resolved = targets.resolve(Some(&wanted)).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].information().serial_number, "B");

        let missing = DeviceIdentifier {
            serial_number: Some("C".to_string()),
            ..Default::default()
        };
        assert!(targets.resolve(Some(&missing)).await.is_empty());
    }

    #[tokio::test]
    async fn test_take_empties_set() {
        let targets = TargetDeviceSet::new();
        targets.replace(vec![handle("A")]).await;

        assert_eq!(targets.take().await.len(), 1);
        assert!(targets.is_empty().await);
    }

    #[test]
    fn test_builder_wires_sftp_from_configuration() {
        let mut configuration = DalConfiguration::default();
        assert!(WorkflowContext::builder(configuration.clone()).build().sftp().is_none());

        configuration.sftp = Some(SftpSettings {
            staging_dir: "/tmp/staging".into(),
            upload_command: vec!["upload".to_string()],
        });
        let context = WorkflowContext::builder(configuration).build();
        assert!(context.sftp().is_some());
    }

    #[test]
    fn test_clones_share_targets_and_token() {
        let context = WorkflowContext::builder(DalConfiguration::default()).build();
        let clone = context.clone();

        context.session_token().cancel();
        assert!(clone.session_token().is_cancelled());
    }
}
