//! Configuration model for the device abstraction layer.
//!
//! Configuration is read from a JSON document:
//!
//! ```json
//! {
//!   "plugin_path": "/opt/dal/plugins",
//!   "devices": {
//!     "Verifone":  { "sort_order": 1, "supported_devices": ["P200", "P400", "M400"] },
//!     "Simulator": { "sort_order": 2, "supported_devices": ["SIM-1000"] },
//!     "IdTech":    { "sort_order": -1 }
//!   },
//!   "sftp": { "staging_dir": "/var/spool/dal", "upload_command": ["dal-uploader", "--once"] },
//!   "state_file": "/var/lib/dal/state.json"
//! }
//! ```
//!
//! A manufacturer with `sort_order` equal to
//! [`DISABLED_SORT_ORDER`](crate::constants::DISABLED_SORT_ORDER), or with no
//! section at all, is skipped by discovery.

use crate::constants::DISABLED_SORT_ORDER;
use crate::{Error, Manufacturer, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-manufacturer discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerSection {
    /// Probe priority; lower values are probed first.
    #[serde(default = "disabled_sort_order")]
    pub sort_order: i32,

    /// Models approved for use; a probed device outside this list is dropped.
    #[serde(default)]
    pub supported_devices: Vec<String>,

    /// Preferred port for the manufacturer's devices, if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

fn disabled_sort_order() -> i32 {
    DISABLED_SORT_ORDER
}

impl ManufacturerSection {
    /// Create an enabled section with the given priority.
    pub fn new(sort_order: i32) -> Self {
        Self {
            sort_order,
            supported_devices: Vec::new(),
            port: None,
        }
    }

    /// Create a disabled section.
    pub fn disabled() -> Self {
        Self::new(DISABLED_SORT_ORDER)
    }

    /// Add approved models.
    pub fn with_supported_devices<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_devices
            .extend(models.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sort_order != DISABLED_SORT_ORDER
    }

    /// Check whether `model` is on the approved list (ASCII case-insensitive).
    #[must_use]
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_devices
            .iter()
            .any(|m| m.eq_ignore_ascii_case(model))
    }
}

/// Settings for staging produced artifacts for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpSettings {
    /// Directory artifacts are copied into before upload.
    pub staging_dir: PathBuf,

    /// Upload program followed by its arguments; the staged file path is
    /// appended as the final argument.
    pub upload_command: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DalConfiguration {
    /// Directory scanned for device plugin manifests.
    #[serde(default)]
    pub plugin_path: PathBuf,

    #[serde(default)]
    pub devices: BTreeMap<Manufacturer, ManufacturerSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sftp: Option<SftpSettings>,

    /// File the in-flight request is persisted to at each checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl DalConfiguration {
    /// Parse and validate configuration from a JSON string.
    ///
    /// # Errors
    /// Returns `Error::Serialization` for malformed JSON and `Error::Config`
    /// when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Register a manufacturer section.
    pub fn with_manufacturer(mut self, manufacturer: Manufacturer, section: ManufacturerSection) -> Self {
        self.devices.insert(manufacturer, section);
        self
    }

    /// Look up the section for a manufacturer.
    #[must_use]
    pub fn manufacturer(&self, manufacturer: Manufacturer) -> Option<&ManufacturerSection> {
        self.devices.get(&manufacturer)
    }

    /// Resolve a manufacturer's sort order; missing sections are disabled.
    #[must_use]
    pub fn sort_order(&self, manufacturer: Manufacturer) -> i32 {
        self.manufacturer(manufacturer)
            .map(|section| section.sort_order)
            .unwrap_or(DISABLED_SORT_ORDER)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    /// Returns `Error::Config` if a sort order is below the disabled sentinel
    /// or the upload command is empty.
    pub fn validate(&self) -> Result<()> {
        for (manufacturer, section) in &self.devices {
            if section.sort_order < DISABLED_SORT_ORDER {
                return Err(Error::Config(format!(
                    "{manufacturer}: sort_order must be >= {DISABLED_SORT_ORDER}, got {}",
                    section.sort_order
                )));
            }
        }

        if let Some(sftp) = &self.sftp
            && sftp.upload_command.is_empty()
        {
            return Err(Error::MissingConfig("sftp.upload_command".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "plugin_path": "/opt/dal/plugins",
        "devices": {
            "Verifone": { "sort_order": 1, "supported_devices": ["P400", "M400"] },
            "IdTech": { "sort_order": -1 },
            "Simulator": {}
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = DalConfiguration::from_json_str(SAMPLE).unwrap();

        assert_eq!(config.plugin_path, PathBuf::from("/opt/dal/plugins"));
        assert_eq!(config.sort_order(Manufacturer::Verifone), 1);
        assert!(
            config
                .manufacturer(Manufacturer::Verifone)
                .unwrap()
                .supports_model("p400")
        );
        assert!(config.sftp.is_none());
    }

    #[rstest]
    #[case(Manufacturer::IdTech)]
    #[case(Manufacturer::Simulator)]
    #[case(Manufacturer::NoDevice)]
    fn test_disabled_manufacturers(#[case] manufacturer: Manufacturer) {
        let config = DalConfiguration::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.sort_order(manufacturer), DISABLED_SORT_ORDER);
    }

    #[test]
    fn test_rejects_invalid_sort_order() {
        let result = DalConfiguration::from_json_str(r#"{"devices": {"Verifone": {"sort_order": -5}}}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_upload_command() {
        let result = DalConfiguration::from_json_str(
            r#"{"sftp": {"staging_dir": "/tmp", "upload_command": []}}"#,
        );
        assert!(matches!(result, Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = DalConfiguration::from_json_str("{ not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = DalConfiguration::from_json_file(file.path()).unwrap();
        assert_eq!(config.devices.len(), 3);
    }

    #[test]
    fn test_missing_file() {
        let result = DalConfiguration::from_json_file("/nonexistent/dal.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_builder() {
        let config = DalConfiguration::default()
            .with_manufacturer(
                Manufacturer::Simulator,
                ManufacturerSection::new(3).with_supported_devices(["SIM-1000"]),
            )
            .with_manufacturer(Manufacturer::IdTech, ManufacturerSection::disabled());

        assert!(config.manufacturer(Manufacturer::Simulator).unwrap().is_enabled());
        assert!(!config.manufacturer(Manufacturer::IdTech).unwrap().is_enabled());
    }
}
