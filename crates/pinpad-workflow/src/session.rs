//! Device abstraction layer session.
//!
//! A session owns the target device set for its lifetime:
//!
//! 1. [`start`](DalSession::start) runs discovery once and keeps the
//!    accepted devices.
//! 2. [`process`](DalSession::process) runs one request through a fresh
//!    [`SubWorkflowController`].
//! 3. [`shutdown`](DalSession::shutdown) cancels in-flight work and releases
//!    every device.

use crate::broker::BrokerOutcome;
use crate::context::{DeviceHandle, WorkflowContext};
use crate::controller::{DiscoveryReport, SubWorkflowController, WorkflowReport};
use crate::error::{Result, WorkflowError};
use pinpad_core::LinkRequest;
use pinpad_core::constants::DEVICE_RECOVERY_TIMEOUT;
use pinpad_hardware::PaymentDevice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Long-lived owner of the target device set.
#[derive(Debug)]
pub struct DalSession {
    context: WorkflowContext,
    started: AtomicBool,
    // Serializes requests; one controller runs at a time.
    gate: Mutex<()>,
}

impl DalSession {
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            context,
            started: AtomicBool::new(false),
            gate: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Discover and probe devices, populating the target set.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NoValidDevice`] when no device was accepted,
    /// and [`WorkflowError::SessionAlreadyStarted`] once a previous start
    /// has succeeded.
    pub async fn start(&self) -> Result<DiscoveryReport> {
        let _guard = self.gate.lock().await;
        if self.is_started() {
            return Err(WorkflowError::SessionAlreadyStarted);
        }
        tracing::info!(plugin_path = %self.context.plugin_path().display(), "starting session");

        let mut controller = SubWorkflowController::new(self.context.clone());
        let report = controller.discover().await?;

        for exception in &report.exceptions {
            tracing::warn!(stage = %exception.stage, "{}", exception.message);
        }
        tracing::info!(devices = report.accepted.len(), "session started");
        self.started.store(true, Ordering::SeqCst);
        Ok(report)
    }

    /// Run one request to completion.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::SessionNotStarted`] before [`start`](Self::start)
    /// has succeeded, and the controller's errors otherwise.
    pub async fn process(&self, request: LinkRequest) -> Result<WorkflowReport> {
        if !self.is_started() {
            return Err(WorkflowError::SessionNotStarted);
        }

        let _guard = self.gate.lock().await;
        let mut controller = SubWorkflowController::new(self.context.clone());
        controller.process(request).await
    }

    /// Parse and run a JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Core`] when the JSON is not a request.
    pub async fn process_json(&self, json: &str) -> Result<WorkflowReport> {
        let request = LinkRequest::from_json(json)?;
        self.process(request).await
    }

    /// Current target devices.
    pub async fn target_devices(&self) -> Vec<DeviceHandle> {
        self.context.targets().snapshot().await
    }

    /// Cancel in-flight work, disconnect every device and empty the target set.
    pub async fn shutdown(&self) {
        self.context.session_token().cancel();
        let _guard = self.gate.lock().await;

        let broker = self.context.broker();
        let devices = self.context.targets().take().await;
        tracing::info!(devices = devices.len(), "shutting down session");

        for handle in devices {
            let identifier = handle.identifier();
            let device = handle.device();
            let mut device = device.lock().await;
            device.detach_events();

            let unit = &mut *device;
            let outcome = broker
                .execute_with_timeout(
                    move |_| async move { unit.disconnect().await },
                    Duration::from_millis(DEVICE_RECOVERY_TIMEOUT),
                    &CancellationToken::new(),
                )
                .await;
            match outcome {
                BrokerOutcome::Success(()) => tracing::debug!(device = %identifier, "device released"),
                BrokerOutcome::Faulted(err) => {
                    tracing::warn!(device = %identifier, error = %err, "disconnect failed");
                }
                _ => tracing::warn!(device = %identifier, "disconnect did not finish"),
            }
        }

        self.started.store(false, Ordering::SeqCst);
    }
}
