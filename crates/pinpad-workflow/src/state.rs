//! Sub-workflow states, the transition table and the initial state selector.
//!
//! Every request runs as a short chain of states:
//!
//! ```text
//! <operation> ──► SanityCheck ──► RequestComplete ──► Undefined (stop)
//! ```
//!
//! Operation states route to `SanityCheck` whether or not the operation
//! raised an exception; recovery decisions live in the sanity check action.
//!
//! # Examples
//!
//! ```
//! use pinpad_core::{LinkRequest, RequestActionType};
//! use pinpad_workflow::state::{SubWorkflowState, initial_state, next_state};
//!
//! let request = LinkRequest::new(RequestActionType::VipaVersions);
//! let first = initial_state(&request).unwrap();
//! assert_eq!(first, SubWorkflowState::VipaVersions);
//!
//! let second = next_state(first, false).unwrap();
//! assert_eq!(second, SubWorkflowState::SanityCheck);
//! ```

use crate::error::{Result, WorkflowError};
use pinpad_core::{LinkRequest, RequestActionType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of work inside a sub-workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubWorkflowState {
    GetStatus,
    GetSecurityConfiguration,
    GetEmvKernelChecksum,
    Configuration,
    FeatureEnablementToken,
    LockDeviceConfig0,
    LockDeviceConfig8,
    UnlockDeviceConfig,
    UpdateHmacKeys,
    GenerateHmac,
    UpdateIdleScreen,
    DisplayCustomScreen,
    Reboot24Hour,
    SetTerminalDateTime,
    VipaVersions,
    ReportEmvKernelVersions,
    GetSphereHealthFile,
    ManualCardEntry,

    /// Post-action check that recovers a misbehaving device.
    SanityCheck,

    /// Terminal node: serialize and publish the response.
    RequestComplete,

    /// No work; the sub-workflow stops here.
    Undefined,
}

impl SubWorkflowState {
    /// Every state, in declaration order.
    pub const ALL: [SubWorkflowState; 21] = [
        Self::GetStatus,
        Self::GetSecurityConfiguration,
        Self::GetEmvKernelChecksum,
        Self::Configuration,
        Self::FeatureEnablementToken,
        Self::LockDeviceConfig0,
        Self::LockDeviceConfig8,
        Self::UnlockDeviceConfig,
        Self::UpdateHmacKeys,
        Self::GenerateHmac,
        Self::UpdateIdleScreen,
        Self::DisplayCustomScreen,
        Self::Reboot24Hour,
        Self::SetTerminalDateTime,
        Self::VipaVersions,
        Self::ReportEmvKernelVersions,
        Self::GetSphereHealthFile,
        Self::ManualCardEntry,
        Self::SanityCheck,
        Self::RequestComplete,
        Self::Undefined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetStatus => "GetStatus",
            Self::GetSecurityConfiguration => "GetSecurityConfiguration",
            Self::GetEmvKernelChecksum => "GetEMVKernelChecksum",
            Self::Configuration => "Configuration",
            Self::FeatureEnablementToken => "FeatureEnablementToken",
            Self::LockDeviceConfig0 => "LockDeviceConfig0",
            Self::LockDeviceConfig8 => "LockDeviceConfig8",
            Self::UnlockDeviceConfig => "UnlockDeviceConfig",
            Self::UpdateHmacKeys => "UpdateHMACKeys",
            Self::GenerateHmac => "GenerateHMAC",
            Self::UpdateIdleScreen => "UpdateIdleScreen",
            Self::DisplayCustomScreen => "DisplayCustomScreen",
            Self::Reboot24Hour => "Reboot24Hour",
            Self::SetTerminalDateTime => "SetTerminalDateTime",
            Self::VipaVersions => "VIPAVersions",
            Self::ReportEmvKernelVersions => "ReportEMVKernelVersions",
            Self::GetSphereHealthFile => "GetSphereHealthFile",
            Self::ManualCardEntry => "ManualCardEntry",
            Self::SanityCheck => "SanityCheck",
            Self::RequestComplete => "RequestComplete",
            Self::Undefined => "Undefined",
        }
    }

    /// Check whether this state performs a device operation.
    pub fn is_operation(&self) -> bool {
        !matches!(
            self,
            Self::SanityCheck | Self::RequestComplete | Self::Undefined
        )
    }
}

impl fmt::Display for SubWorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition table.
///
/// `exception_occurred` does not influence operation states; they always
/// continue with `SanityCheck`.
///
/// # Errors
///
/// Returns [`WorkflowError::InvalidStateTransition`] for `Undefined`, which
/// has no successor.
pub fn next_state(current: SubWorkflowState, exception_occurred: bool) -> Result<SubWorkflowState> {
    use SubWorkflowState::*;

    let next = match (current, exception_occurred) {
        (
            GetStatus
            | GetSecurityConfiguration
            | GetEmvKernelChecksum
            | Configuration
            | FeatureEnablementToken
            | LockDeviceConfig0
            | LockDeviceConfig8
            | UnlockDeviceConfig
            | UpdateHmacKeys
            | GenerateHmac
            | UpdateIdleScreen
            | DisplayCustomScreen
            | Reboot24Hour
            | SetTerminalDateTime
            | VipaVersions
            | ReportEmvKernelVersions
            | GetSphereHealthFile
            | ManualCardEntry,
            _,
        ) => SanityCheck,
        (SanityCheck, _) => RequestComplete,
        (RequestComplete, _) => Undefined,
        (Undefined, _) => return Err(WorkflowError::InvalidStateTransition { state: current }),
    };

    Ok(next)
}

/// Map a wire-level action to the state that runs first.
pub fn state_for_action(action: RequestActionType) -> SubWorkflowState {
    match action {
        RequestActionType::GetStatus => SubWorkflowState::GetStatus,
        RequestActionType::GetSecurityConfiguration => SubWorkflowState::GetSecurityConfiguration,
        RequestActionType::GetEmvKernelChecksum => SubWorkflowState::GetEmvKernelChecksum,
        RequestActionType::Configuration => SubWorkflowState::Configuration,
        RequestActionType::FeatureEnablementToken => SubWorkflowState::FeatureEnablementToken,
        RequestActionType::LockDeviceConfig0 => SubWorkflowState::LockDeviceConfig0,
        RequestActionType::LockDeviceConfig8 => SubWorkflowState::LockDeviceConfig8,
        RequestActionType::UnlockDeviceConfig => SubWorkflowState::UnlockDeviceConfig,
        RequestActionType::UpdateHmacKeys => SubWorkflowState::UpdateHmacKeys,
        RequestActionType::GenerateHmac => SubWorkflowState::GenerateHmac,
        RequestActionType::UpdateIdleScreen => SubWorkflowState::UpdateIdleScreen,
        RequestActionType::DisplayCustomScreen => SubWorkflowState::DisplayCustomScreen,
        RequestActionType::Reboot24Hour => SubWorkflowState::Reboot24Hour,
        RequestActionType::SetTerminalDateTime => SubWorkflowState::SetTerminalDateTime,
        RequestActionType::VipaVersions => SubWorkflowState::VipaVersions,
        RequestActionType::ReportEmvKernelVersions => SubWorkflowState::ReportEmvKernelVersions,
        RequestActionType::GetSphereHealthFile => SubWorkflowState::GetSphereHealthFile,
        RequestActionType::ManualCardEntry => SubWorkflowState::ManualCardEntry,
        RequestActionType::AbortCommand | RequestActionType::Unknown => SubWorkflowState::Undefined,
    }
}

/// Initial state selector.
///
/// Unmapped actions resolve to `Undefined`; the controller refuses to start
/// those.
///
/// # Errors
///
/// Returns [`WorkflowError::InvalidArgument`] if the request carries no action.
pub fn initial_state(request: &LinkRequest) -> Result<SubWorkflowState> {
    let action = request
        .action
        .ok_or_else(|| WorkflowError::invalid_argument("request has no action"))?;
    Ok(state_for_action(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_transition_table_is_total() {
        for state in SubWorkflowState::ALL {
            if state == SubWorkflowState::Undefined {
                continue;
            }
            assert!(next_state(state, true).is_ok(), "{state} with exception");
            assert!(next_state(state, false).is_ok(), "{state} without exception");
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_terminal_routing(#[case] exception: bool) {
        assert_eq!(
            next_state(SubWorkflowState::SanityCheck, exception).unwrap(),
            SubWorkflowState::RequestComplete
        );
        assert_eq!(
            next_state(SubWorkflowState::RequestComplete, exception).unwrap(),
            SubWorkflowState::Undefined
        );
    }

    #[test]
    fn test_operation_states_ignore_exception_flag() {
        for state in SubWorkflowState::ALL.into_iter().filter(|s| s.is_operation()) {
            assert_eq!(next_state(state, true).unwrap(), SubWorkflowState::SanityCheck);
            assert_eq!(next_state(state, false).unwrap(), SubWorkflowState::SanityCheck);
        }
    }

    #[test]
    fn test_undefined_has_no_successor() {
        let err = next_state(SubWorkflowState::Undefined, false).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidStateTransition {
                state: SubWorkflowState::Undefined
            }
        ));
    }

    #[rstest]
    #[case(RequestActionType::GetStatus, SubWorkflowState::GetStatus)]
    #[case(RequestActionType::GetSecurityConfiguration, SubWorkflowState::GetSecurityConfiguration)]
    #[case(RequestActionType::LockDeviceConfig8, SubWorkflowState::LockDeviceConfig8)]
    #[case(RequestActionType::SetTerminalDateTime, SubWorkflowState::SetTerminalDateTime)]
    #[case(RequestActionType::GetSphereHealthFile, SubWorkflowState::GetSphereHealthFile)]
    #[case(RequestActionType::AbortCommand, SubWorkflowState::Undefined)]
    #[case(RequestActionType::Unknown, SubWorkflowState::Undefined)]
    fn test_initial_state(#[case] action: RequestActionType, #[case] expected: SubWorkflowState) {
        let request = LinkRequest::new(action);
        assert_eq!(initial_state(&request).unwrap(), expected);
    }

    #[test]
    fn test_initial_state_requires_action() {
        let mut request = LinkRequest::new(RequestActionType::GetStatus);
        request.action = None;

        assert!(matches!(
            initial_state(&request),
            Err(WorkflowError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_every_operation_is_reachable_from_an_action() {
        let reachable: std::collections::HashSet<_> = RequestActionType::ALL
            .into_iter()
            .map(state_for_action)
            .collect();
        for state in SubWorkflowState::ALL.into_iter().filter(|s| s.is_operation()) {
            assert!(reachable.contains(&state), "{state} has no request action");
        }
    }
}
