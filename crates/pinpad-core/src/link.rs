//! Request/response envelope exchanged with callers.
//!
//! A [`LinkRequest`] enters the engine carrying the requested action, an
//! optional device identifier and the action-specific payload. Each action
//! appends one [`DeviceResponse`] per device it talked to, so by the time the
//! request completes the same envelope doubles as the response.
//!
//! # Examples
//!
//! ```
//! use pinpad_core::{LinkRequest, RequestActionType};
//!
//! let request = LinkRequest::new(RequestActionType::GetStatus);
//! let json = request.to_json().unwrap();
//! let parsed = LinkRequest::from_json(&json).unwrap();
//! assert_eq!(parsed.action, Some(RequestActionType::GetStatus));
//! ```

use crate::{Manufacturer, RequestActionType, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Identifies a terminal by manufacturer, model and serial number.
///
/// Every field is optional on the wire. A request without an identifier
/// targets the single connected device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Manufacturer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl DeviceIdentifier {
    /// Create an identifier for a fully known device.
    pub fn new(
        manufacturer: Manufacturer,
        model: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: Some(manufacturer),
            model: Some(model.into()),
            serial_number: Some(serial_number.into()),
        }
    }

    /// Check whether `other` satisfies every field set on this identifier.
    ///
    /// Unset fields act as wildcards; model and serial comparisons ignore
    /// ASCII case.
    #[must_use]
    pub fn matches(&self, other: &DeviceIdentifier) -> bool {
        fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
            match (wanted, actual) {
                (None, _) => true,
                (Some(w), Some(a)) => w.eq_ignore_ascii_case(a),
                (Some(_), None) => false,
            }
        }

        let manufacturer_ok = match self.manufacturer {
            None => true,
            Some(m) => other.manufacturer == Some(m),
        };

        manufacturer_ok
            && field_matches(&self.model, &other.model)
            && field_matches(&self.serial_number, &other.serial_number)
    }
}

impl std::fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let manufacturer = self
            .manufacturer
            .map(|m| m.as_str())
            .unwrap_or("unknown");
        write!(
            f,
            "{}/{}/{}",
            manufacturer,
            self.model.as_deref().unwrap_or("-"),
            self.serial_number.as_deref().unwrap_or("-")
        )
    }
}

/// Custom screen to render on the terminal display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomScreen {
    pub template: String,

    #[serde(default)]
    pub lines: Vec<String>,
}

/// Action-specific request data.
///
/// Only the fields relevant to the requested action are expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_screen: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_screen: Option<CustomScreen>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_date_time: Option<DateTime<Local>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_key_slot: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration_packages: Vec<String>,

    #[serde(default)]
    pub manual_entry_prompt: bool,
}

/// Outcome of a single device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Error detail attached to a device response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkErrorValue {
    pub code: String,

    pub description: String,

    /// Numeric status reported by the terminal, when it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code: Option<u32>,
}

impl LinkErrorValue {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            device_code: None,
        }
    }

    pub fn with_device_code(mut self, device_code: u32) -> Self {
        self.device_code = Some(device_code);
        self
    }
}

/// Result of one action against one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub device: DeviceIdentifier,

    pub status: ResponseStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LinkErrorValue>,

    /// Action-specific result data (versions, security configuration, …).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,

    /// Set by the device when the change only takes effect after a reboot.
    #[serde(default)]
    pub reboot_required: bool,

    /// File produced by the device, e.g. a health report awaiting upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    pub timestamp: DateTime<Utc>,
}

impl DeviceResponse {
    /// Create a successful response carrying `data`.
    pub fn success(device: DeviceIdentifier, data: serde_json::Value) -> Self {
        Self {
            device,
            status: ResponseStatus::Success,
            errors: Vec::new(),
            data,
            reboot_required: false,
            artifact: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an error response with a single error value.
    pub fn error(device: DeviceIdentifier, error: LinkErrorValue) -> Self {
        Self {
            device,
            status: ResponseStatus::Error,
            errors: vec![error],
            data: serde_json::Value::Null,
            reboot_required: false,
            artifact: None,
            timestamp: Utc::now(),
        }
    }

    /// Record an additional error, turning the response into an error.
    pub fn push_error(&mut self, error: LinkErrorValue) {
        self.status = ResponseStatus::Error;
        self.errors.push(error);
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Request envelope threaded through a sub-workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRequest {
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,

    #[serde(default)]
    pub action: Option<RequestActionType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceIdentifier>,

    #[serde(default)]
    pub payload: DeviceRequestPayload,

    #[serde(default)]
    pub responses: Vec<DeviceResponse>,
}

impl LinkRequest {
    /// Create a request for `action` targeting the connected device.
    pub fn new(action: RequestActionType) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            action: Some(action),
            device: None,
            payload: DeviceRequestPayload::default(),
            responses: Vec::new(),
        }
    }

    /// Target a specific device.
    pub fn with_device(mut self, device: DeviceIdentifier) -> Self {
        self.device = Some(device);
        self
    }

    /// Replace the action payload.
    pub fn with_payload(mut self, payload: DeviceRequestPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Parse a request from JSON.
    ///
    /// # Errors
    /// Returns `Error::Serialization` if the input is not a valid envelope.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the request (and any responses) to JSON.
    ///
    /// # Errors
    /// Returns `Error::Serialization` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Count responses that carry errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.responses.iter().filter(|r| !r.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn known_device() -> DeviceIdentifier {
        DeviceIdentifier::new(Manufacturer::Verifone, "P400", "275-123-456")
    }

    #[rstest]
    #[case(DeviceIdentifier::default(), true)]
    #[case(DeviceIdentifier { serial_number: Some("275-123-456".into()), ..Default::default() }, true)]
    #[case(DeviceIdentifier { model: Some("p400".into()), ..Default::default() }, true)]
    #[case(DeviceIdentifier { manufacturer: Some(Manufacturer::IdTech), ..Default::default() }, false)]
    #[case(DeviceIdentifier { serial_number: Some("999".into()), ..Default::default() }, false)]
    fn test_identifier_matching(#[case] wanted: DeviceIdentifier, #[case] expected: bool) {
        assert_eq!(wanted.matches(&known_device()), expected);
    }

    #[test]
    fn test_identifier_display() {
        assert_eq!(known_device().to_string(), "Verifone/P400/275-123-456");
        assert_eq!(DeviceIdentifier::default().to_string(), "unknown/-/-");
    }

    #[test]
    fn test_request_from_minimal_json() {
        let request = LinkRequest::from_json(r#"{"action":"GET_SECURITY_CONFIGURATION"}"#).unwrap();

        assert_eq!(
            request.action,
            Some(RequestActionType::GetSecurityConfiguration)
        );
        assert!(request.device.is_none());
        assert!(request.responses.is_empty());
    }

    #[test]
    fn test_request_without_action() {
        let request = LinkRequest::from_json("{}").unwrap();
        assert!(request.action.is_none());
    }

    #[test]
    fn test_error_response() {
        let mut response = DeviceResponse::success(known_device(), serde_json::json!({"ok": true}));
        assert!(response.is_success());

        response.push_error(LinkErrorValue::new("DEVICE_FAULT", "bad").with_device_code(0x9F41));
        assert!(!response.is_success());
        assert_eq!(response.errors[0].device_code, Some(0x9F41));
    }

    #[test]
    fn test_error_count() {
        let mut request = LinkRequest::new(RequestActionType::GetStatus);
        request
            .responses
            .push(DeviceResponse::success(known_device(), serde_json::Value::Null));
        request.responses.push(DeviceResponse::error(
            known_device(),
            LinkErrorValue::new("DEVICE_TIMEOUT", "timed out"),
        ));

        assert_eq!(request.error_count(), 1);
    }
}
