//! Error types for device operations.
//!
//! This module defines error types specific to payment terminal operations,
//! covering disconnections, cancellation, terminal status codes and
//! unsupported operations.

/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during device operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation was cancelled before the device answered.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Operation is not supported by this device.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Terminal answered with a non-success status code.
    #[error("Device status 0x{code:04X}: {message}")]
    DeviceStatus { code: u32, message: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new terminal status error.
    pub fn device_status(code: u32, message: impl Into<String>) -> Self {
        Self::DeviceStatus {
            code,
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Numeric status reported by the terminal, if any.
    pub fn device_code(&self) -> Option<u32> {
        match self {
            Self::DeviceStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HardwareError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("P400");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: P400");
    }

    #[test]
    fn test_device_status_error() {
        let error = HardwareError::device_status(0x9F41, "Security configuration locked");
        assert_eq!(error.device_code(), Some(0x9F41));
        assert_eq!(
            error.to_string(),
            "Device status 0x9F41: Security configuration locked"
        );
    }

    #[test]
    fn test_device_code_absent() {
        assert_eq!(HardwareError::communication("port closed").device_code(), None);
        assert_eq!(HardwareError::unsupported("vipa_versions").device_code(), None);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let error: HardwareError = io.into();
        assert!(matches!(error, HardwareError::Io(_)));
    }
}
