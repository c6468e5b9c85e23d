//! Sub-state actions and the action registry.
//!
//! Each [`SubWorkflowState`] is served by exactly one action. The registry,
//! [`create_action`], is an exhaustive `match`, so a state without an action
//! does not compile.
//!
//! Actions own one unit of work: they read the in-flight request from the
//! controller, talk to devices only through the cancellation broker, attach
//! per-device results and report back with an [`ActionSignal`].

mod complete;
mod device_call;
mod discovery;
mod sanity;

pub use complete::{NO_STATE_OBJECT, RequestCompleteAction};
pub use device_call::{DeviceCallAction, DeviceOperation};
pub use discovery::{DISCOVERY_STAGE, DeviceDiscoveryAction, DiscoveryOutcome, discover_and_probe};
pub use sanity::SanityCheckAction;

use crate::controller::SubWorkflowController;
use crate::error::StateException;
use crate::state::SubWorkflowState;
use uuid::Uuid;

/// Static per-action launch metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchRules {
    /// Request a fresh child of the session token before running.
    pub request_cancellation_token: bool,
}

impl LaunchRules {
    /// Rules for actions that talk to devices.
    pub const DEVICE_ACCESS: LaunchRules = LaunchRules {
        request_cancellation_token: true,
    };

    /// Rules for actions that never talk to devices.
    pub const NO_DEVICE_ACCESS: LaunchRules = LaunchRules {
        request_cancellation_token: false,
    };
}

/// Signal an action sends back to the controller when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSignal {
    Complete,
    Error(StateException),
}

impl ActionSignal {
    pub fn error(state: SubWorkflowState, message: impl Into<String>) -> Self {
        Self::Error(StateException::new(state, message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Action serving one sub-workflow state.
#[derive(Debug)]
pub enum SubStateAction {
    DeviceCall(DeviceCallAction),
    SanityCheck(SanityCheckAction),
    RequestComplete(RequestCompleteAction),
}

impl SubStateAction {
    /// State this action serves.
    pub fn state(&self) -> SubWorkflowState {
        match self {
            Self::DeviceCall(action) => action.operation().state(),
            Self::SanityCheck(_) => SubWorkflowState::SanityCheck,
            Self::RequestComplete(_) => SubWorkflowState::RequestComplete,
        }
    }

    /// Identity of this action instance.
    pub fn instance_id(&self) -> Uuid {
        match self {
            Self::DeviceCall(action) => action.instance_id(),
            Self::SanityCheck(action) => action.instance_id(),
            Self::RequestComplete(action) => action.instance_id(),
        }
    }

    pub fn launch_rules(&self) -> LaunchRules {
        match self {
            Self::DeviceCall(_) | Self::SanityCheck(_) => LaunchRules::DEVICE_ACCESS,
            Self::RequestComplete(_) => LaunchRules::NO_DEVICE_ACCESS,
        }
    }

    /// Run the action's unit of work.
    pub async fn do_work(&mut self, controller: &mut SubWorkflowController) -> ActionSignal {
        match self {
            Self::DeviceCall(action) => action.do_work(controller).await,
            Self::SanityCheck(action) => action.do_work(controller).await,
            Self::RequestComplete(action) => action.do_work(controller).await,
        }
    }
}

/// Action registry: construct the action serving `state`.
///
/// Returns `None` only for [`SubWorkflowState::Undefined`], which has no work.
pub fn create_action(state: SubWorkflowState) -> Option<SubStateAction> {
    use SubWorkflowState as S;

    let operation = match state {
        S::GetStatus => DeviceOperation::GetStatus,
        S::GetSecurityConfiguration => DeviceOperation::GetSecurityConfiguration,
        S::GetEmvKernelChecksum => DeviceOperation::GetEmvKernelChecksum,
        S::Configuration => DeviceOperation::Configuration,
        S::FeatureEnablementToken => DeviceOperation::FeatureEnablementToken,
        S::LockDeviceConfig0 => DeviceOperation::LockDeviceConfig0,
        S::LockDeviceConfig8 => DeviceOperation::LockDeviceConfig8,
        S::UnlockDeviceConfig => DeviceOperation::UnlockDeviceConfig,
        S::UpdateHmacKeys => DeviceOperation::UpdateHmacKeys,
        S::GenerateHmac => DeviceOperation::GenerateHmac,
        S::UpdateIdleScreen => DeviceOperation::UpdateIdleScreen,
        S::DisplayCustomScreen => DeviceOperation::DisplayCustomScreen,
        S::Reboot24Hour => DeviceOperation::Reboot24Hour,
        S::SetTerminalDateTime => DeviceOperation::SetTerminalDateTime,
        S::VipaVersions => DeviceOperation::VipaVersions,
        S::ReportEmvKernelVersions => DeviceOperation::ReportEmvKernelVersions,
        S::GetSphereHealthFile => DeviceOperation::GetSphereHealthFile,
        S::ManualCardEntry => DeviceOperation::ManualCardEntry,
        S::SanityCheck => return Some(SubStateAction::SanityCheck(SanityCheckAction::new())),
        S::RequestComplete => {
            return Some(SubStateAction::RequestComplete(RequestCompleteAction::new()));
        }
        S::Undefined => return None,
    };

    Some(SubStateAction::DeviceCall(DeviceCallAction::new(operation)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_state() {
        for state in SubWorkflowState::ALL {
            match create_action(state) {
                Some(action) => assert_eq!(action.state(), state),
                None => assert_eq!(state, SubWorkflowState::Undefined),
            }
        }
    }

    #[test]
    fn test_fresh_actions_have_distinct_identity() {
        let first = create_action(SubWorkflowState::GetStatus).unwrap();
        let second = create_action(SubWorkflowState::GetStatus).unwrap();
        assert_ne!(first.instance_id(), second.instance_id());
    }

    #[test]
    fn test_launch_rules() {
        let request_complete = create_action(SubWorkflowState::RequestComplete).unwrap();
        assert!(!request_complete.launch_rules().request_cancellation_token);

        let sanity = create_action(SubWorkflowState::SanityCheck).unwrap();
        assert!(sanity.launch_rules().request_cancellation_token);

        let query = create_action(SubWorkflowState::VipaVersions).unwrap();
        assert_eq!(query.launch_rules(), LaunchRules::DEVICE_ACCESS);
    }
}
