//! Actions that perform one device operation against the target devices.

use super::ActionSignal;
use crate::broker::BrokerOutcome;
use crate::context::DeviceHandle;
use crate::controller::SubWorkflowController;
use crate::state::SubWorkflowState;
use chrono::Local;
use pinpad_core::constants::{
    DEVICE_QUERY_TIMEOUT, DEVICE_REBOOT_TIMEOUT, DEVICE_UPDATE_TIMEOUT, DISPLAY_UPDATE_TIMEOUT,
    ERROR_DEVICE_CANCELLED, ERROR_DEVICE_FAULT, ERROR_DEVICE_NOT_FOUND, ERROR_DEVICE_TIMEOUT,
    ERROR_REBOOT_FAILED, ERROR_SFTP_HANDOFF_FAILED, GET_STATUS_TIMEOUT, HEALTH_FILE_TIMEOUT,
    MANUAL_ENTRY_TIMEOUT,
};
use pinpad_core::{DeviceResponse, LinkErrorValue, LinkRequest};
use pinpad_hardware::{AnyPaymentDevice, HardwareError, PaymentDevice};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Device operation performed by a [`DeviceCallAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOperation {
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
}

impl DeviceOperation {
    /// State served by this operation.
    pub fn state(self) -> SubWorkflowState {
        match self {
            Self::GetStatus => SubWorkflowState::GetStatus,
            Self::GetSecurityConfiguration => SubWorkflowState::GetSecurityConfiguration,
            Self::GetEmvKernelChecksum => SubWorkflowState::GetEmvKernelChecksum,
            Self::Configuration => SubWorkflowState::Configuration,
            Self::FeatureEnablementToken => SubWorkflowState::FeatureEnablementToken,
            Self::LockDeviceConfig0 => SubWorkflowState::LockDeviceConfig0,
            Self::LockDeviceConfig8 => SubWorkflowState::LockDeviceConfig8,
            Self::UnlockDeviceConfig => SubWorkflowState::UnlockDeviceConfig,
            Self::UpdateHmacKeys => SubWorkflowState::UpdateHmacKeys,
            Self::GenerateHmac => SubWorkflowState::GenerateHmac,
            Self::UpdateIdleScreen => SubWorkflowState::UpdateIdleScreen,
            Self::DisplayCustomScreen => SubWorkflowState::DisplayCustomScreen,
            Self::Reboot24Hour => SubWorkflowState::Reboot24Hour,
            Self::SetTerminalDateTime => SubWorkflowState::SetTerminalDateTime,
            Self::VipaVersions => SubWorkflowState::VipaVersions,
            Self::ReportEmvKernelVersions => SubWorkflowState::ReportEmvKernelVersions,
            Self::GetSphereHealthFile => SubWorkflowState::GetSphereHealthFile,
            Self::ManualCardEntry => SubWorkflowState::ManualCardEntry,
        }
    }

    /// Deadline for one device call.
    pub fn timeout(self) -> Duration {
        let millis = match self {
            Self::GetStatus => GET_STATUS_TIMEOUT,
            Self::GetSecurityConfiguration
            | Self::GetEmvKernelChecksum
            | Self::GenerateHmac
            | Self::Reboot24Hour
            | Self::SetTerminalDateTime
            | Self::VipaVersions
            | Self::ReportEmvKernelVersions => DEVICE_QUERY_TIMEOUT,
            Self::Configuration
            | Self::FeatureEnablementToken
            | Self::LockDeviceConfig0
            | Self::LockDeviceConfig8
            | Self::UnlockDeviceConfig
            | Self::UpdateHmacKeys => DEVICE_UPDATE_TIMEOUT,
            Self::UpdateIdleScreen | Self::DisplayCustomScreen => DISPLAY_UPDATE_TIMEOUT,
            Self::GetSphereHealthFile => HEALTH_FILE_TIMEOUT,
            Self::ManualCardEntry => MANUAL_ENTRY_TIMEOUT,
        };
        Duration::from_millis(millis)
    }

    /// Check whether the operation changes device state and may need a reboot.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Configuration
                | Self::FeatureEnablementToken
                | Self::LockDeviceConfig0
                | Self::LockDeviceConfig8
                | Self::UnlockDeviceConfig
                | Self::UpdateHmacKeys
                | Self::UpdateIdleScreen
                | Self::Reboot24Hour
                | Self::SetTerminalDateTime
        )
    }

    /// Call the capability method implementing this operation.
    pub async fn invoke(
        self,
        device: &mut AnyPaymentDevice,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> pinpad_hardware::Result<LinkRequest> {
        match self {
            Self::GetStatus => device.get_status(request, cancel).await,
            Self::GetSecurityConfiguration => device.get_security_configuration(request, cancel).await,
            Self::GetEmvKernelChecksum => device.get_emv_kernel_checksum(request, cancel).await,
            Self::Configuration => device.configuration(request, cancel).await,
            Self::FeatureEnablementToken => device.feature_enablement_token(request, cancel).await,
            Self::LockDeviceConfig0 => device.lock_config_0(request, cancel).await,
            Self::LockDeviceConfig8 => device.lock_config_8(request, cancel).await,
            Self::UnlockDeviceConfig => device.unlock_config(request, cancel).await,
            Self::UpdateHmacKeys => device.update_hmac_keys(request, cancel).await,
            Self::GenerateHmac => device.generate_hmac(request, cancel).await,
            Self::UpdateIdleScreen => device.update_idle_screen(request, cancel).await,
            Self::DisplayCustomScreen => device.display_custom_screen(request, cancel).await,
            Self::Reboot24Hour => device.reboot_24_hour(request, cancel).await,
            Self::SetTerminalDateTime => device.set_terminal_date_time(request, cancel).await,
            Self::VipaVersions => device.vipa_versions(request, cancel).await,
            Self::ReportEmvKernelVersions => device.report_emv_kernel_versions(request, cancel).await,
            Self::GetSphereHealthFile => device.get_sphere_health_file(request, cancel).await,
            Self::ManualCardEntry => device.manual_card_entry(request, cancel).await,
        }
    }
}

/// Runs one [`DeviceOperation`] against every resolved target device.
///
/// Each device receives its own copy of the inbound request. A device that
/// times out, is cancelled or fails gets an error response; the remaining
/// devices are still called.
#[derive(Debug)]
pub struct DeviceCallAction {
    id: Uuid,
    operation: DeviceOperation,
}

impl DeviceCallAction {
    pub fn new(operation: DeviceOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
        }
    }

    pub fn operation(&self) -> DeviceOperation {
        self.operation
    }

    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    pub async fn do_work(&mut self, controller: &mut SubWorkflowController) -> ActionSignal {
        let state = self.operation.state();

        let Some(mut request) = controller.take_state_object() else {
            tracing::error!(%state, "no request to process");
            return ActionSignal::error(state, "no state object: request payload was not supplied");
        };

        if self.operation == DeviceOperation::SetTerminalDateTime
            && request.payload.terminal_date_time.is_none()
        {
            request.payload.terminal_date_time = Some(Local::now());
        }

        let targets = controller.resolve_targets(request.device.as_ref()).await;
        if targets.is_empty() {
            let identifier = request.device.clone().unwrap_or_default();
            tracing::warn!(%state, device = %identifier, "no target device matches request");
            request.responses.push(DeviceResponse::error(
                identifier.clone(),
                LinkErrorValue::new(
                    ERROR_DEVICE_NOT_FOUND,
                    format!("no target device matches {identifier}"),
                ),
            ));
        }

        let cancel = controller.cancellation_token();
        for handle in &targets {
            let responses = self.call_device(controller, handle, &request, &cancel).await;
            request.responses.extend(responses);
        }

        match controller.save_state(request) {
            Ok(()) => ActionSignal::Complete,
            Err(err) => {
                tracing::error!(%state, error = %err, "failed to save state");
                ActionSignal::error(state, format!("failed to save state: {err}"))
            }
        }
    }

    async fn call_device(
        &self,
        controller: &mut SubWorkflowController,
        handle: &DeviceHandle,
        inbound: &LinkRequest,
        cancel: &CancellationToken,
    ) -> Vec<DeviceResponse> {
        let operation = self.operation;
        let state = operation.state();
        let identifier = handle.identifier();

        let mut copy = inbound.clone();
        copy.responses.clear();

        let device = handle.device();
        let outcome = controller
            .cancellation_broker()
            .execute_with_timeout(
                move |token| async move {
                    let mut device = device.lock().await;
                    operation.invoke(&mut device, copy, token).await
                },
                operation.timeout(),
                cancel,
            )
            .await;

        match outcome {
            BrokerOutcome::Success(answered) => {
                let mut responses = answered.responses;
                if responses.is_empty() {
                    responses.push(DeviceResponse::success(
                        identifier.clone(),
                        serde_json::Value::Null,
                    ));
                }
                for response in &mut responses {
                    self.follow_up(controller, handle, response, cancel).await;
                }
                tracing::info!(%state, device = %identifier, "{state} succeeded");
                responses
            }
            BrokerOutcome::TimedOut => {
                controller.record_timeout();
                let millis = operation.timeout().as_millis();
                tracing::warn!(%state, device = %identifier, timeout_ms = millis as u64, "{state} timed out");
                vec![DeviceResponse::error(
                    identifier,
                    LinkErrorValue::new(
                        ERROR_DEVICE_TIMEOUT,
                        format!("{state} timed out after {millis} ms"),
                    ),
                )]
            }
            BrokerOutcome::Cancelled => {
                tracing::warn!(%state, device = %identifier, "{state} cancelled");
                vec![DeviceResponse::error(
                    identifier,
                    LinkErrorValue::new(ERROR_DEVICE_CANCELLED, format!("{state} cancelled")),
                )]
            }
            BrokerOutcome::Faulted(err) => {
                tracing::error!(
                    %state,
                    device = %identifier,
                    code = ?err.device_code(),
                    error = %err,
                    "{state} failed"
                );
                vec![DeviceResponse::error(
                    identifier,
                    fault_value(ERROR_DEVICE_FAULT, &err),
                )]
            }
        }
    }

    /// Reboot follow-up and artifact hand-off for one successful response.
    async fn follow_up(
        &self,
        controller: &mut SubWorkflowController,
        handle: &DeviceHandle,
        response: &mut DeviceResponse,
        cancel: &CancellationToken,
    ) {
        let identifier = handle.identifier();

        if response.reboot_required && response.is_success() && self.operation.is_mutating() {
            tracing::info!(device = %identifier, "reboot required, rebooting device");
            let device = handle.device();
            let outcome = controller
                .cancellation_broker()
                .execute_with_timeout(
                    move |token| async move { device.lock().await.reboot_device(token).await },
                    Duration::from_millis(DEVICE_REBOOT_TIMEOUT),
                    cancel,
                )
                .await;

            match outcome {
                BrokerOutcome::Success(()) => {
                    tracing::info!(device = %identifier, "device rebooted");
                }
                BrokerOutcome::TimedOut => {
                    controller.record_timeout();
                    tracing::warn!(device = %identifier, "reboot timed out");
                    response.push_error(LinkErrorValue::new(
                        ERROR_REBOOT_FAILED,
                        format!("reboot timed out after {DEVICE_REBOOT_TIMEOUT} ms"),
                    ));
                }
                BrokerOutcome::Cancelled => {
                    tracing::warn!(device = %identifier, "reboot cancelled");
                    response.push_error(LinkErrorValue::new(ERROR_REBOOT_FAILED, "reboot cancelled"));
                }
                BrokerOutcome::Faulted(err) => {
                    tracing::warn!(device = %identifier, code = ?err.device_code(), error = %err, "reboot failed");
                    response.push_error(fault_value(ERROR_REBOOT_FAILED, &err));
                }
            }
        }

        let Some(artifact) = response.artifact.clone() else {
            return;
        };

        match controller.context().sftp().cloned() {
            Some(handoff) => {
                if let Err(err) = handoff.hand_off(&artifact).await {
                    tracing::warn!(device = %identifier, artifact = %artifact.display(), error = %err, "artifact hand-off failed");
                    response.push_error(LinkErrorValue::new(
                        ERROR_SFTP_HANDOFF_FAILED,
                        err.to_string(),
                    ));
                }
            }
            None => {
                tracing::warn!(device = %identifier, artifact = %artifact.display(), "no upload hand-off configured");
                response.push_error(LinkErrorValue::new(
                    ERROR_SFTP_HANDOFF_FAILED,
                    "upload hand-off is not configured",
                ));
            }
        }
    }
}

fn fault_value(code: &str, err: &HardwareError) -> LinkErrorValue {
    let value = LinkErrorValue::new(code, err.to_string());
    match err.device_code() {
        Some(device_code) => value.with_device_code(device_code),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DeviceOperation::GetStatus, GET_STATUS_TIMEOUT)]
    #[case(DeviceOperation::GetSecurityConfiguration, DEVICE_QUERY_TIMEOUT)]
    #[case(DeviceOperation::Configuration, DEVICE_UPDATE_TIMEOUT)]
    #[case(DeviceOperation::DisplayCustomScreen, DISPLAY_UPDATE_TIMEOUT)]
    #[case(DeviceOperation::GetSphereHealthFile, HEALTH_FILE_TIMEOUT)]
    #[case(DeviceOperation::ManualCardEntry, MANUAL_ENTRY_TIMEOUT)]
    fn test_operation_timeouts(#[case] operation: DeviceOperation, #[case] millis: u64) {
        assert_eq!(operation.timeout(), Duration::from_millis(millis));
    }

    #[rstest]
    #[case(DeviceOperation::Configuration, true)]
    #[case(DeviceOperation::LockDeviceConfig8, true)]
    #[case(DeviceOperation::SetTerminalDateTime, true)]
    #[case(DeviceOperation::GetStatus, false)]
    #[case(DeviceOperation::VipaVersions, false)]
    #[case(DeviceOperation::GetSphereHealthFile, false)]
    fn test_mutating_operations(#[case] operation: DeviceOperation, #[case] mutating: bool) {
        assert_eq!(operation.is_mutating(), mutating);
    }

    #[test]
    fn test_fault_value_carries_device_code() {
        let value = fault_value(ERROR_DEVICE_FAULT, &HardwareError::device_status(0x9F41, "busy"));
        assert_eq!(value.code, ERROR_DEVICE_FAULT);
        assert_eq!(value.device_code, Some(0x9F41));

        let value = fault_value(ERROR_DEVICE_FAULT, &HardwareError::communication("crc"));
        assert_eq!(value.device_code, None);
    }
}
