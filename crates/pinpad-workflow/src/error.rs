//! Error types for the workflow engine.

use crate::state::SubWorkflowState;
use pinpad_hardware::HardwareError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by the controller and session to their callers.
///
/// Device failures never appear here: they are converted into per-device
/// error responses or [`StateException`] records inside the engine.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The transition table was asked about a state it has no route for.
    #[error("Invalid state transition from {state}")]
    InvalidStateTransition { state: SubWorkflowState },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Discovery finished without accepting a single device.
    #[error("No valid device found: {0}")]
    NoValidDevice(String),

    #[error("Session not started")]
    SessionNotStarted,

    /// Discovery already ran; the target set lives until shutdown.
    #[error("Session already started")]
    SessionAlreadyStarted,

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Upload hand-off failed: {0}")]
    Handoff(String),

    #[error(transparent)]
    Core(#[from] pinpad_core::Error),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn plugin(message: impl Into<String>) -> Self {
        Self::Plugin(message.into())
    }

    pub fn handoff(message: impl Into<String>) -> Self {
        Self::Handoff(message.into())
    }
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Failure captured while an action or the discovery pipeline ran.
///
/// A `StateException` is data carried in reports, not an error that
/// propagates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateException {
    /// Name of the state (or pipeline stage) that captured the failure.
    pub stage: String,

    pub message: String,
}

impl StateException {
    pub fn new(state: SubWorkflowState, message: impl Into<String>) -> Self {
        Self::for_stage(state.as_str(), message)
    }

    pub fn for_stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StateException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::InvalidStateTransition {
            state: SubWorkflowState::Undefined,
        };
        assert_eq!(err.to_string(), "Invalid state transition from Undefined");

        let err = WorkflowError::NoValidDevice("all probes failed".to_string());
        assert!(err.to_string().contains("all probes failed"));
    }

    #[test]
    fn test_hardware_error_is_transparent() {
        let err: WorkflowError = HardwareError::disconnected("P400").into();
        assert_eq!(err.to_string(), HardwareError::disconnected("P400").to_string());
    }

    #[test]
    fn test_state_exception_display() {
        let exception = StateException::new(SubWorkflowState::SanityCheck, "recovery failed");
        assert_eq!(exception.to_string(), "SanityCheck: recovery failed");
        assert_eq!(exception.stage, "SanityCheck");
    }
}
