//! Device plugin loading.
//!
//! A [`DeviceLoader`] enumerates the manufacturer templates reachable from
//! the configured plugin path. Discovery asks each template for its physical
//! units and then works on fresh per-unit instances.
//!
//! [`ManifestDeviceLoader`] reads `*.plugin.json` manifests in lexical file
//! order:
//!
//! ```json
//! {
//!   "manufacturer": "Verifone",
//!   "driver": "simulator",
//!   "units": [
//!     { "manufacturer": "Verifone", "model": "P400", "serial_number": "275-330-181" }
//!   ]
//! }
//! ```

use crate::error::{Result, WorkflowError};
use pinpad_core::Manufacturer;
use pinpad_hardware::simulator::{CallJournal, SimulatorDevice};
use pinpad_hardware::{AnyPaymentDevice, DeviceInformation, NullDevice, PaymentDevice};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name suffix of plugin manifests.
pub const PLUGIN_MANIFEST_SUFFIX: &str = ".plugin.json";

/// Source of manufacturer templates.
pub trait DeviceLoader: Send + Sync {
    /// Load every template reachable from `plugin_path`, in discovery order.
    fn load(&self, plugin_path: &Path) -> Result<Vec<AnyPaymentDevice>>;
}

/// Driver backing a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Simulator,
    None,
}

/// Contents of a `*.plugin.json` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub manufacturer: Manufacturer,

    pub driver: DriverKind,

    /// Units the simulator driver reports on discovery.
    #[serde(default)]
    pub units: Vec<DeviceInformation>,
}

impl PluginManifest {
    fn into_template(self, journal: Option<&CallJournal>) -> AnyPaymentDevice {
        match self.driver {
            DriverKind::Simulator => {
                let (device, _handle) = match journal {
                    Some(journal) => {
                        SimulatorDevice::with_journal(self.manufacturer, self.units, journal.clone())
                    }
                    None => SimulatorDevice::with_units(self.manufacturer, self.units),
                };
                AnyPaymentDevice::Simulator(device)
            }
            DriverKind::None => AnyPaymentDevice::NoDevice(NullDevice::new(self.manufacturer)),
        }
    }
}

/// Loader reading plugin manifests from a directory.
#[derive(Debug, Clone, Default)]
pub struct ManifestDeviceLoader {
    journal: Option<CallJournal>,
}

impl ManifestDeviceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record simulator calls into `journal`.
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }
}

impl DeviceLoader for ManifestDeviceLoader {
    fn load(&self, plugin_path: &Path) -> Result<Vec<AnyPaymentDevice>> {
        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(plugin_path)? {
            let path = entry?.path();
            let is_manifest = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(PLUGIN_MANIFEST_SUFFIX));
            if is_manifest && path.is_file() {
                manifests.push(path);
            }
        }
        manifests.sort();

        let mut templates = Vec::with_capacity(manifests.len());
        for path in manifests {
            let json = std::fs::read_to_string(&path)?;
            let manifest: PluginManifest = serde_json::from_str(&json).map_err(|e| {
                WorkflowError::plugin(format!("{}: {e}", path.display()))
            })?;
            tracing::debug!(
                plugin = %path.display(),
                manufacturer = %manifest.manufacturer,
                units = manifest.units.len(),
                "plugin loaded"
            );
            templates.push(manifest.into_template(self.journal.as_ref()));
        }

        Ok(templates)
    }
}

/// Loader serving prebuilt templates, ignoring the plugin path.
///
/// Each load hands out fresh instances, so the same loader can serve several
/// sessions.
#[derive(Debug, Default)]
pub struct StaticDeviceLoader {
    templates: Vec<AnyPaymentDevice>,
}

impl StaticDeviceLoader {
    pub fn new(templates: Vec<AnyPaymentDevice>) -> Self {
        Self { templates }
    }

    /// Append a template.
    pub fn with_template(mut self, template: impl Into<AnyPaymentDevice>) -> Self {
        self.templates.push(template.into());
        self
    }
}

impl DeviceLoader for StaticDeviceLoader {
    fn load(&self, _plugin_path: &Path) -> Result<Vec<AnyPaymentDevice>> {
        Ok(self.templates.iter().map(|t| t.fresh_instance()).collect())
    }
}
