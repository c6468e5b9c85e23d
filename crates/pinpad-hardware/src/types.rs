//! Common types shared across device implementations.
//!
//! This module defines the identity record attached to every probed device
//! and the result of a probe.

use pinpad_core::{DeviceIdentifier, Manufacturer};
use serde::{Deserialize, Serialize};

/// Identity and metadata of a physical terminal.
///
/// Created during discovery and probe, then attached to the device for its
/// lifetime. Only `port` and `firmware_version` are expected to change, and
/// only when the device reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInformation {
    /// Terminal manufacturer.
    pub manufacturer: Manufacturer,

    /// Model identifier (e.g., "P400", "VP3350").
    pub model: String,

    /// Serial number.
    pub serial_number: String,

    /// Optional firmware version string.
    #[serde(default)]
    pub firmware_version: Option<String>,

    /// Port the terminal is attached to (e.g., "COM9", "/dev/ttyACM0").
    #[serde(default)]
    pub port: Option<String>,
}

impl DeviceInformation {
    /// Create a new DeviceInformation with required fields.
    pub fn new(
        manufacturer: Manufacturer,
        model: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer,
            model: model.into(),
            serial_number: serial_number.into(),
            firmware_version: None,
            port: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Wire-level identifier for this device.
    pub fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(self.manufacturer, &self.model, &self.serial_number)
    }

    /// Apply the fields that may change when a device reconnects.
    pub fn refresh_from(&mut self, reconnected: &DeviceInformation) {
        self.port = reconnected.port.clone();
        self.firmware_version = reconnected.firmware_version.clone();
    }
}

/// Result of probing a candidate device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the device answered and is usable.
    pub active: bool,

    /// Non-fatal problems reported while probing.
    pub errors: Vec<String>,
}

impl ProbeOutcome {
    /// A probe that found a working device.
    pub fn active() -> Self {
        Self {
            active: true,
            errors: Vec::new(),
        }
    }

    /// A probe that did not find a working device.
    pub fn inactive(reason: impl Into<String>) -> Self {
        Self {
            active: false,
            errors: vec![reason.into()],
        }
    }
}
