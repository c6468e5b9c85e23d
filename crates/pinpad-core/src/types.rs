use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal manufacturer handled by a device plugin.
///
/// `NoDevice` is the sentinel plugin used when a deployment runs without a
/// terminal attached; discovery never probes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Manufacturer {
    Verifone,
    IdTech,
    Simulator,
    NoDevice,
}

impl Manufacturer {
    /// Get the canonical manufacturer name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::Verifone => "Verifone",
            Manufacturer::IdTech => "IdTech",
            Manufacturer::Simulator => "Simulator",
            Manufacturer::NoDevice => "NoDevice",
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Manufacturer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "verifone" => Ok(Manufacturer::Verifone),
            "idtech" | "id_tech" => Ok(Manufacturer::IdTech),
            "simulator" => Ok(Manufacturer::Simulator),
            "nodevice" | "no_device" => Ok(Manufacturer::NoDevice),
            _ => Err(Error::InvalidArgument(format!("Unknown manufacturer: {s}"))),
        }
    }
}

/// Operation requested by a caller, as carried on the wire.
///
/// Values the engine does not serve (`AbortCommand`, and anything unknown on
/// the wire) are kept so that the request can be parsed and then rejected
/// with a precise error instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestActionType {
    GetStatus,
    GetSecurityConfiguration,
    GetEmvKernelChecksum,
    Configuration,
    FeatureEnablementToken,
    #[serde(rename = "LOCK_DEVICE_CONFIG_0")]
    LockDeviceConfig0,
    #[serde(rename = "LOCK_DEVICE_CONFIG_8")]
    LockDeviceConfig8,
    UnlockDeviceConfig,
    UpdateHmacKeys,
    GenerateHmac,
    UpdateIdleScreen,
    DisplayCustomScreen,
    #[serde(rename = "REBOOT_24_HOUR")]
    Reboot24Hour,
    SetTerminalDateTime,
    VipaVersions,
    ReportEmvKernelVersions,
    GetSphereHealthFile,
    ManualCardEntry,
    AbortCommand,
    #[serde(other)]
    Unknown,
}

impl RequestActionType {
    /// Every action, in wire declaration order.
    pub const ALL: [RequestActionType; 20] = [
        RequestActionType::GetStatus,
        RequestActionType::GetSecurityConfiguration,
        RequestActionType::GetEmvKernelChecksum,
        RequestActionType::Configuration,
        RequestActionType::FeatureEnablementToken,
        RequestActionType::LockDeviceConfig0,
        RequestActionType::LockDeviceConfig8,
        RequestActionType::UnlockDeviceConfig,
        RequestActionType::UpdateHmacKeys,
        RequestActionType::GenerateHmac,
        RequestActionType::UpdateIdleScreen,
        RequestActionType::DisplayCustomScreen,
        RequestActionType::Reboot24Hour,
        RequestActionType::SetTerminalDateTime,
        RequestActionType::VipaVersions,
        RequestActionType::ReportEmvKernelVersions,
        RequestActionType::GetSphereHealthFile,
        RequestActionType::ManualCardEntry,
        RequestActionType::AbortCommand,
        RequestActionType::Unknown,
    ];

    /// Get the wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestActionType::GetStatus => "GET_STATUS",
            RequestActionType::GetSecurityConfiguration => "GET_SECURITY_CONFIGURATION",
            RequestActionType::GetEmvKernelChecksum => "GET_EMV_KERNEL_CHECKSUM",
            RequestActionType::Configuration => "CONFIGURATION",
            RequestActionType::FeatureEnablementToken => "FEATURE_ENABLEMENT_TOKEN",
            RequestActionType::LockDeviceConfig0 => "LOCK_DEVICE_CONFIG_0",
            RequestActionType::LockDeviceConfig8 => "LOCK_DEVICE_CONFIG_8",
            RequestActionType::UnlockDeviceConfig => "UNLOCK_DEVICE_CONFIG",
            RequestActionType::UpdateHmacKeys => "UPDATE_HMAC_KEYS",
            RequestActionType::GenerateHmac => "GENERATE_HMAC",
            RequestActionType::UpdateIdleScreen => "UPDATE_IDLE_SCREEN",
            RequestActionType::DisplayCustomScreen => "DISPLAY_CUSTOM_SCREEN",
            RequestActionType::Reboot24Hour => "REBOOT_24_HOUR",
            RequestActionType::SetTerminalDateTime => "SET_TERMINAL_DATE_TIME",
            RequestActionType::VipaVersions => "VIPA_VERSIONS",
            RequestActionType::ReportEmvKernelVersions => "REPORT_EMV_KERNEL_VERSIONS",
            RequestActionType::GetSphereHealthFile => "GET_SPHERE_HEALTH_FILE",
            RequestActionType::ManualCardEntry => "MANUAL_CARD_ENTRY",
            RequestActionType::AbortCommand => "ABORT_COMMAND",
            RequestActionType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RequestActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asynchronous event raised by a device outside of a request/response call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEvent {
    #[default]
    None,
    CancelKeyPressed,
    DeviceUnplugged,
    DevicePlugged,
    RequestTimeout,
    ProcessingError,
}

impl DeviceEvent {
    /// Check whether this is the "nothing happened" event.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, DeviceEvent::None)
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DeviceEvent::None => "None",
            DeviceEvent::CancelKeyPressed => "CancelKeyPressed",
            DeviceEvent::DeviceUnplugged => "DeviceUnplugged",
            DeviceEvent::DevicePlugged => "DevicePlugged",
            DeviceEvent::RequestTimeout => "RequestTimeout",
            DeviceEvent::ProcessingError => "ProcessingError",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Verifone", Manufacturer::Verifone)]
    #[case("idtech", Manufacturer::IdTech)]
    #[case("SIMULATOR", Manufacturer::Simulator)]
    #[case("no_device", Manufacturer::NoDevice)]
    fn test_manufacturer_parse(#[case] input: &str, #[case] expected: Manufacturer) {
        let manufacturer: Manufacturer = input.parse().unwrap();
        assert_eq!(manufacturer, expected);
    }

    #[test]
    fn test_manufacturer_parse_unknown() {
        let result: Result<Manufacturer> = "Ingenico".parse();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    #[case(RequestActionType::GetStatus, "\"GET_STATUS\"")]
    #[case(RequestActionType::LockDeviceConfig0, "\"LOCK_DEVICE_CONFIG_0\"")]
    #[case(RequestActionType::Reboot24Hour, "\"REBOOT_24_HOUR\"")]
    #[case(RequestActionType::VipaVersions, "\"VIPA_VERSIONS\"")]
    fn test_action_wire_name(#[case] action: RequestActionType, #[case] json: &str) {
        assert_eq!(serde_json::to_string(&action).unwrap(), json);
        assert_eq!(format!("\"{}\"", action.as_str()), json);
    }

    #[test]
    fn test_unknown_action_deserializes() {
        let action: RequestActionType = serde_json::from_str("\"SALE\"").unwrap();
        assert_eq!(action, RequestActionType::Unknown);
    }

    #[test]
    fn test_device_event_default() {
        assert!(DeviceEvent::default().is_none());
        assert!(!DeviceEvent::DeviceUnplugged.is_none());
        assert_eq!(DeviceEvent::CancelKeyPressed.to_string(), "CancelKeyPressed");
    }
}
