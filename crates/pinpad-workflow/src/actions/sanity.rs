//! Post-action sanity check.

use super::ActionSignal;
use crate::broker::BrokerOutcome;
use crate::controller::SubWorkflowController;
use crate::state::SubWorkflowState;
use pinpad_core::constants::DEVICE_RECOVERY_TIMEOUT;
use pinpad_hardware::PaymentDevice;
use std::time::Duration;
use uuid::Uuid;

/// Recovers misbehaving devices before a request is closed out.
///
/// Recovery runs when the previous action timed out or a device raised an
/// event. Every resolved target is asked to recover under
/// `DEVICE_RECOVERY_TIMEOUT`; failures are logged and never fatal. The event
/// and the timeout flag are cleared afterwards, and the request is saved when
/// one is present.
#[derive(Debug)]
pub struct SanityCheckAction {
    id: Uuid,
}

impl SanityCheckAction {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    pub async fn do_work(&mut self, controller: &mut SubWorkflowController) -> ActionSignal {
        let event = controller.device_event();
        let timed_out = controller.did_timeout_occur();

        if timed_out || !event.is_none() {
            tracing::info!(%event, timed_out, "device recovery required");
            self.recover_targets(controller).await;
            controller.context().events().reset();
            controller.clear_timeout();
        }

        let Some(request) = controller.take_state_object() else {
            return ActionSignal::Complete;
        };

        match controller.save_state(request) {
            Ok(()) => ActionSignal::Complete,
            Err(err) => {
                tracing::error!(error = %err, "failed to save state");
                ActionSignal::error(
                    SubWorkflowState::SanityCheck,
                    format!("failed to save state: {err}"),
                )
            }
        }
    }

    async fn recover_targets(&self, controller: &mut SubWorkflowController) {
        let wanted = controller.state_object().and_then(|r| r.device.clone());
        let targets = controller.resolve_targets(wanted.as_ref()).await;
        let cancel = controller.cancellation_token();
        let broker = controller.cancellation_broker();

        for handle in targets {
            let identifier = handle.identifier();
            let device = handle.device();
            let outcome = broker
                .execute_with_timeout(
                    move |token| async move { device.lock().await.recover(token).await },
                    Duration::from_millis(DEVICE_RECOVERY_TIMEOUT),
                    &cancel,
                )
                .await;

            match outcome {
                BrokerOutcome::Success(true) => {
                    tracing::info!(device = %identifier, "device recovered");
                }
                BrokerOutcome::Success(false) => {
                    tracing::warn!(device = %identifier, "device did not recover");
                }
                BrokerOutcome::TimedOut => {
                    tracing::warn!(device = %identifier, timeout_ms = DEVICE_RECOVERY_TIMEOUT, "device recovery timed out");
                }
                BrokerOutcome::Cancelled => {
                    tracing::warn!(device = %identifier, "device recovery cancelled");
                }
                BrokerOutcome::Faulted(err) => {
                    tracing::warn!(device = %identifier, code = ?err.device_code(), error = %err, "device recovery failed");
                }
            }
        }
    }
}

impl Default for SanityCheckAction {
    fn default() -> Self {
        Self::new()
    }
}
