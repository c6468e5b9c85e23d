//! Terminal action of every sub-workflow.

use super::ActionSignal;
use crate::controller::SubWorkflowController;
use crate::state::SubWorkflowState;
use uuid::Uuid;

/// Message attached when there is nothing to publish.
pub const NO_STATE_OBJECT: &str = "no state object to publish";

/// Serializes the final request envelope and publishes it.
///
/// Without a request there is nothing to publish: the action signals an
/// error and the request is reported as failed.
#[derive(Debug)]
pub struct RequestCompleteAction {
    id: Uuid,
}

impl RequestCompleteAction {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    pub async fn do_work(&mut self, controller: &mut SubWorkflowController) -> ActionSignal {
        let state = SubWorkflowState::RequestComplete;

        let Some(request) = controller.state_object() else {
            tracing::warn!(%state, "{NO_STATE_OBJECT}");
            return ActionSignal::error(state, NO_STATE_OBJECT);
        };

        let request_id = request.request_id;
        let errors = request.error_count();
        let json = match request.to_json() {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%request_id, error = %err, "failed to serialize response");
                return ActionSignal::error(state, format!("failed to serialize response: {err}"));
            }
        };

        if let Err(err) = controller.context().publisher().publish(json) {
            tracing::error!(%request_id, error = %err, "failed to publish response");
            return ActionSignal::error(state, format!("failed to publish response: {err}"));
        }

        controller.mark_published();
        tracing::info!(%request_id, errors, "request complete");
        ActionSignal::Complete
    }
}

impl Default for RequestCompleteAction {
    fn default() -> Self {
        Self::new()
    }
}
