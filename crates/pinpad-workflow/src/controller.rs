//! Sub-workflow controller.
//!
//! A controller drives one request from its entry action to completion. It
//! owns the current action outright; actions borrow the controller while
//! they run and reach devices, the state store and the broker through it.
//!
//! ```text
//! requested state ──► create_action ──► do_work ──► signal
//!                          ▲                          │
//!                          └──────── next_state ◄─────┘
//! ```
//!
//! Exactly one action runs at a time; each request gets its own controller.
//!
//! # Examples
//!
//! ```no_run
//! use pinpad_core::{DalConfiguration, LinkRequest, RequestActionType};
//! use pinpad_workflow::{SubWorkflowController, WorkflowContext};
//!
//! # async fn example() -> pinpad_workflow::Result<()> {
//! let context = WorkflowContext::builder(DalConfiguration::default()).build();
//! let mut controller = SubWorkflowController::new(context);
//!
//! let report = controller
//!     .process(LinkRequest::new(RequestActionType::GetStatus))
//!     .await?;
//! println!("visited {:?}", report.visited);
//! # Ok(())
//! # }
//! ```

use crate::actions::{ActionSignal, DeviceDiscoveryAction, SubStateAction, create_action};
use crate::broker::CancellationBroker;
use crate::context::{DeviceHandle, WorkflowContext};
use crate::error::{Result, StateException, WorkflowError};
use crate::state::{SubWorkflowState, initial_state, next_state};
use pinpad_core::{DalConfiguration, DeviceEvent, DeviceIdentifier, LinkRequest, RequestActionType};
use pinpad_hardware::DeviceInformation;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct FinishedAction {
    state: SubWorkflowState,
    exception_occurred: bool,
}

/// Summary of one sub-workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub request_id: Option<Uuid>,

    /// States whose actions ran, in order.
    pub visited: Vec<SubWorkflowState>,

    /// Last state that ran.
    pub final_state: SubWorkflowState,

    pub exceptions: Vec<StateException>,

    /// Final request envelope, including per-device responses.
    pub response: Option<LinkRequest>,

    /// Whether the response reached the publisher.
    pub published: bool,
}

impl WorkflowReport {
    /// The response was published and no action raised an exception.
    pub fn is_success(&self) -> bool {
        self.published && self.exceptions.is_empty()
    }
}

/// Summary of a discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    /// Devices accepted into the target set, in acceptance order.
    pub accepted: Vec<DeviceInformation>,

    /// Failures recorded while probing.
    pub exceptions: Vec<StateException>,
}

/// Drives one sub-workflow.
#[derive(Debug)]
pub struct SubWorkflowController {
    context: WorkflowContext,
    state_object: Option<LinkRequest>,
    cancel: CancellationToken,
    timeout_occurred: bool,
    current: Option<SubStateAction>,
    last_finished: Option<FinishedAction>,
    visited: Vec<SubWorkflowState>,
    exceptions: Vec<StateException>,
    published: bool,
}

impl SubWorkflowController {
    pub fn new(context: WorkflowContext) -> Self {
        let cancel = context.session_token().child_token();
        Self {
            context,
            state_object: None,
            cancel,
            timeout_occurred: false,
            current: None,
            last_finished: None,
            visited: Vec::new(),
            exceptions: Vec::new(),
            published: false,
        }
    }

    /// Seed the controller with an in-flight request.
    pub fn with_state_object(mut self, request: LinkRequest) -> Self {
        self.state_object = Some(request);
        self
    }

    /// Run the sub-workflow for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidArgument`] if the request has no
    /// action, [`WorkflowError::UnsupportedAction`] if its action has no
    /// sub-workflow, and [`WorkflowError::InvalidStateTransition`] if the
    /// transition table is asked about `Undefined`.
    pub async fn process(&mut self, request: LinkRequest) -> Result<WorkflowReport> {
        let initial = initial_state(&request)?;
        if initial == SubWorkflowState::Undefined {
            let action = request
                .action
                .as_ref()
                .map(RequestActionType::as_str)
                .unwrap_or("UNKNOWN");
            tracing::warn!(request_id = %request.request_id, action, "unsupported action rejected");
            return Err(WorkflowError::UnsupportedAction(action.to_string()));
        }

        tracing::info!(request_id = %request.request_id, state = %initial, "processing request");
        self.state_object = Some(request);
        self.run(initial).await
    }

    /// Run actions starting at `requested` until the workflow stops.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidStateTransition`] on a transition
    /// table defect.
    pub async fn run(&mut self, requested: SubWorkflowState) -> Result<WorkflowReport> {
        while self.get_next_action(requested)?.is_some() {
            self.run_current().await;
        }
        Ok(self.report())
    }

    /// Resolve the action that runs next.
    ///
    /// Before any action has finished this is the action for `requested`.
    /// Afterwards the transition table decides from the finished action's
    /// state and exception flag. A cached action serving the resulting state
    /// is reused; otherwise a new one is constructed and cached. Returns
    /// `None` once the workflow reaches `Undefined`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidStateTransition`] if the finished
    /// state has no route.
    pub fn get_next_action(
        &mut self,
        requested: SubWorkflowState,
    ) -> Result<Option<&SubStateAction>> {
        let target = match self.last_finished {
            None => requested,
            Some(finished) => next_state(finished.state, finished.exception_occurred)?,
        };

        let reuse = self
            .current
            .as_ref()
            .is_some_and(|action| action.state() == target);
        if reuse {
            return Ok(self.current.as_ref());
        }

        self.current = create_action(target);
        if let Some(action) = &self.current {
            tracing::debug!(state = %target, id = %action.instance_id(), "action created");
        }
        Ok(self.current.as_ref())
    }

    async fn run_current(&mut self) {
        let Some(mut action) = self.current.take() else {
            return;
        };
        let state = action.state();

        if action.launch_rules().request_cancellation_token {
            self.refresh_cancellation_token();
        }

        tracing::debug!(%state, "running action");
        let signal = action.do_work(self).await;
        let exception_occurred = self.absorb(state, signal);

        self.visited.push(state);
        self.last_finished = Some(FinishedAction {
            state,
            exception_occurred,
        });
        self.current = Some(action);
    }

    fn absorb(&mut self, state: SubWorkflowState, signal: ActionSignal) -> bool {
        match signal {
            ActionSignal::Complete => false,
            ActionSignal::Error(exception) => {
                tracing::warn!(%state, error = %exception.message, "action signalled error");
                self.exceptions.push(exception);
                true
            }
        }
    }

    /// Run the discovery pipeline and populate the target device set.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NoValidDevice`] when no device was accepted.
    pub async fn discover(&mut self) -> Result<DiscoveryReport> {
        let mut action = DeviceDiscoveryAction::new();
        self.refresh_cancellation_token();

        let signal = action.do_work(self).await;
        if let ActionSignal::Error(exception) = signal {
            let details: Vec<&str> = self.exceptions.iter().map(|e| e.message.as_str()).collect();
            let message = if details.is_empty() {
                exception.message
            } else {
                format!("{} ({})", exception.message, details.join("; "))
            };
            return Err(WorkflowError::NoValidDevice(message));
        }

        Ok(DiscoveryReport {
            accepted: self
                .target_devices()
                .await
                .iter()
                .map(|handle| handle.information().clone())
                .collect(),
            exceptions: self.exceptions.clone(),
        })
    }

    /// Build a report of what has run so far.
    pub fn report(&self) -> WorkflowReport {
        WorkflowReport {
            request_id: self.state_object.as_ref().map(|r| r.request_id),
            visited: self.visited.clone(),
            final_state: self
                .visited
                .last()
                .copied()
                .unwrap_or(SubWorkflowState::Undefined),
            exceptions: self.exceptions.clone(),
            response: self.state_object.clone(),
            published: self.published,
        }
    }

    // Surface consumed by actions.

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn configuration(&self) -> &DalConfiguration {
        self.context.configuration()
    }

    pub fn plugin_path(&self) -> &Path {
        self.context.plugin_path()
    }

    pub async fn target_devices(&self) -> Vec<DeviceHandle> {
        self.context.targets().snapshot().await
    }

    /// Target devices matching `identifier`, or all of them when absent.
    pub async fn resolve_targets(&self, identifier: Option<&DeviceIdentifier>) -> Vec<DeviceHandle> {
        self.context.targets().resolve(identifier).await
    }

    pub fn state_object(&self) -> Option<&LinkRequest> {
        self.state_object.as_ref()
    }

    /// Take the in-flight request; the taking action owns it until it saves.
    pub fn take_state_object(&mut self) -> Option<LinkRequest> {
        self.state_object.take()
    }

    /// Persist `request` and make it the in-flight request again.
    ///
    /// # Errors
    ///
    /// Returns the state store's error; the request is kept either way.
    pub fn save_state(&mut self, request: LinkRequest) -> Result<()> {
        let saved = self.context.store().save(&request);
        self.state_object = Some(request);
        saved
    }

    pub fn cancellation_broker(&self) -> CancellationBroker {
        self.context.broker()
    }

    /// Token for the running action.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace the running token with a fresh child of the session token.
    pub fn refresh_cancellation_token(&mut self) {
        self.cancel = self.context.session_token().child_token();
    }

    /// Most recent event raised by a device.
    pub fn device_event(&self) -> DeviceEvent {
        self.context.events().current()
    }

    pub fn did_timeout_occur(&self) -> bool {
        self.timeout_occurred
    }

    pub fn record_timeout(&mut self) {
        self.timeout_occurred = true;
    }

    pub fn clear_timeout(&mut self) {
        self.timeout_occurred = false;
    }

    pub fn record_exceptions(&mut self, exceptions: impl IntoIterator<Item = StateException>) {
        self.exceptions.extend(exceptions);
    }

    pub fn mark_published(&mut self) {
        self.published = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NO_STATE_OBJECT;
    use crate::publisher::MemoryPublisher;
    use crate::store::MemoryStateStore;
    use std::sync::Arc;

    fn controller() -> (SubWorkflowController, Arc<MemoryStateStore>, Arc<MemoryPublisher>) {
        let store = Arc::new(MemoryStateStore::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let context = WorkflowContext::builder(DalConfiguration::default())
            .with_store(store.clone())
            .with_publisher(publisher.clone())
            .build();
        (SubWorkflowController::new(context), store, publisher)
    }

    #[test]
    fn test_first_action_is_requested_state() {
        let (mut controller, _, _) = controller();
        let action = controller
            .get_next_action(SubWorkflowState::VipaVersions)
            .unwrap()
            .unwrap();
        assert_eq!(action.state(), SubWorkflowState::VipaVersions);
    }

    #[test]
    fn test_cached_action_is_reused() {
        let (mut controller, _, _) = controller();
        controller.last_finished = Some(FinishedAction {
            state: SubWorkflowState::GetStatus,
            exception_occurred: false,
        });

        let first = controller
            .get_next_action(SubWorkflowState::GetStatus)
            .unwrap()
            .unwrap()
            .instance_id();
        let second = controller
            .get_next_action(SubWorkflowState::GetStatus)
            .unwrap()
            .unwrap()
            .instance_id();

        assert_eq!(first, second);
        assert_eq!(
            controller.current.as_ref().unwrap().state(),
            SubWorkflowState::SanityCheck
        );
    }

    #[test]
    fn test_new_state_replaces_cached_action() {
        let (mut controller, _, _) = controller();
        let first = controller
            .get_next_action(SubWorkflowState::GetStatus)
            .unwrap()
            .unwrap()
            .instance_id();

        controller.last_finished = Some(FinishedAction {
            state: SubWorkflowState::GetStatus,
            exception_occurred: true,
        });
        let next = controller
            .get_next_action(SubWorkflowState::GetStatus)
            .unwrap()
            .unwrap();

        assert_eq!(next.state(), SubWorkflowState::SanityCheck);
        assert_ne!(next.instance_id(), first);
    }

    #[test]
    fn test_workflow_stops_after_request_complete() {
        let (mut controller, _, _) = controller();
        controller.last_finished = Some(FinishedAction {
            state: SubWorkflowState::RequestComplete,
            exception_occurred: false,
        });

        assert!(controller
            .get_next_action(SubWorkflowState::GetStatus)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unsupported_action_is_rejected() {
        let (mut controller, store, _) = controller();
        let result = controller
            .process(LinkRequest::new(RequestActionType::AbortCommand))
            .await;

        assert!(matches!(result, Err(WorkflowError::UnsupportedAction(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_request_without_action_is_rejected() {
        let (mut controller, _, _) = controller();
        let mut request = LinkRequest::new(RequestActionType::GetStatus);
        request.action = None;

        assert!(matches!(
            controller.process(request).await,
            Err(WorkflowError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_request_complete_without_state_object() {
        let (mut controller, _, publisher) = controller();

        let report = controller.run(SubWorkflowState::RequestComplete).await.unwrap();

        assert_eq!(report.visited, vec![SubWorkflowState::RequestComplete]);
        assert!(!report.published);
        assert!(!report.is_success());
        assert_eq!(report.exceptions.len(), 1);
        assert_eq!(report.exceptions[0].message, NO_STATE_OBJECT);
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test]
    async fn test_operation_without_state_object_still_closes_out() {
        let (mut controller, store, _) = controller();

        let report = controller.run(SubWorkflowState::GetStatus).await.unwrap();

        assert_eq!(
            report.visited,
            vec![
                SubWorkflowState::GetStatus,
                SubWorkflowState::SanityCheck,
                SubWorkflowState::RequestComplete,
            ]
        );
        assert_eq!(report.exceptions.len(), 2);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_no_targets_reports_device_not_found() {
        let (mut controller, store, publisher) = controller();

        let report = controller
            .process(LinkRequest::new(RequestActionType::GetStatus))
            .await
            .unwrap();

        assert!(report.is_success());
        let response = report.response.unwrap();
        assert_eq!(response.responses.len(), 1);
        assert_eq!(response.responses[0].errors[0].code, "DEVICE_NOT_FOUND");
        assert_eq!(store.save_count(), 2);
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_token_follows_session_token() {
        let (mut controller, _, _) = controller();
        controller.refresh_cancellation_token();
        let token = controller.cancellation_token();

        controller.context().session_token().cancel();
        assert!(token.is_cancelled());
    }
}
