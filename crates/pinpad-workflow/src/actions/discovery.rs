//! Device discovery and probe pipeline.
//!
//! ```text
//! load plugins ─► drop disabled ─► stable sort by sort_order
//!     └─► per manufacturer (NoDevice skipped): discover units
//!           └─► per unit: fresh instance ─► attach events ─► probe (bounded)
//!                 ├─ failed/inactive ─► detach, disconnect, record exception
//!                 ├─ model not approved ─► idle, drop
//!                 └─ accepted
//! ```
//!
//! Probing is sequential so the priority order is deterministic.

use super::ActionSignal;
use crate::broker::{BrokerOutcome, CancellationBroker};
use crate::context::DeviceHandle;
use crate::controller::SubWorkflowController;
use crate::error::StateException;
use crate::loader::DeviceLoader;
use pinpad_core::constants::{
    DEVICE_PROBE_TIMEOUT, DEVICE_RECOVERY_TIMEOUT, DISABLED_SORT_ORDER, GET_STATUS_TIMEOUT,
};
use pinpad_core::{
    DalConfiguration, LinkRequest, Manufacturer, ManufacturerSection, RequestActionType,
};
use pinpad_hardware::{AnyPaymentDevice, DeviceEventChannel, DeviceInformation, PaymentDevice};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Stage name recorded on exceptions captured by discovery.
pub const DISCOVERY_STAGE: &str = "DeviceDiscovery";

/// Devices accepted by the pipeline and the failures met on the way.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub accepted: Vec<DeviceHandle>,
    pub exceptions: Vec<StateException>,
}

/// Enumerate, filter, sort and probe candidate devices.
///
/// Failures never abort the pipeline; they are recorded as exceptions and the
/// remaining candidates are still probed.
pub async fn discover_and_probe(
    loader: &dyn DeviceLoader,
    plugin_path: &Path,
    configuration: &DalConfiguration,
    events: &DeviceEventChannel,
    cancel: &CancellationToken,
) -> DiscoveryOutcome {
    let broker = CancellationBroker::new();
    let probe_timeout = Duration::from_millis(DEVICE_PROBE_TIMEOUT);
    let mut outcome = DiscoveryOutcome::default();

    let templates = match loader.load(plugin_path) {
        Ok(templates) => templates,
        Err(err) => {
            tracing::error!(plugin_path = %plugin_path.display(), error = %err, "failed to load device plugins");
            outcome.exceptions.push(StateException::for_stage(
                DISCOVERY_STAGE,
                format!("failed to load device plugins: {err}"),
            ));
            return outcome;
        }
    };

    let mut candidates: Vec<(i32, AnyPaymentDevice)> = templates
        .into_iter()
        .filter_map(|template| {
            let sort_order = configuration.sort_order(template.manufacturer());
            if sort_order == DISABLED_SORT_ORDER {
                tracing::debug!(manufacturer = %template.manufacturer(), "manufacturer disabled");
                None
            } else {
                Some((sort_order, template))
            }
        })
        .collect();
    candidates.sort_by_key(|(sort_order, _)| *sort_order);

    for (sort_order, mut template) in candidates {
        let manufacturer = template.manufacturer();
        if manufacturer == Manufacturer::NoDevice {
            continue;
        }
        let section = configuration
            .manufacturer(manufacturer)
            .cloned()
            .unwrap_or_else(ManufacturerSection::disabled);

        tracing::debug!(%manufacturer, sort_order, "discovering devices");
        let template_ref = &mut template;
        let units = match broker
            .execute_with_timeout(
                move |_| async move { template_ref.discover_devices().await },
                probe_timeout,
                cancel,
            )
            .await
        {
            BrokerOutcome::Success(units) => units,
            failed => {
                let reason = describe_failure(&failed, DEVICE_PROBE_TIMEOUT);
                let message = format!("{manufacturer} discovery {reason}");
                tracing::warn!(%manufacturer, "{message}");
                outcome
                    .exceptions
                    .push(StateException::for_stage(DISCOVERY_STAGE, message));
                continue;
            }
        };

        for info in units {
            let mut unit = template.fresh_instance();
            unit.attach_events(events.publisher());

            let probed = {
                let unit_ref = &mut unit;
                let section_ref = &section;
                let info_ref = &info;
                broker
                    .execute_with_timeout(
                        move |token| async move { unit_ref.probe(section_ref, info_ref, token).await },
                        probe_timeout,
                        cancel,
                    )
                    .await
            };

            let failure = match probed {
                BrokerOutcome::Success(result) if result.active => None,
                BrokerOutcome::Success(result) => Some(if result.errors.is_empty() {
                    "inactive".to_string()
                } else {
                    format!("inactive: {}", result.errors.join("; "))
                }),
                failed => Some(describe_failure(&failed, DEVICE_PROBE_TIMEOUT)),
            };

            let identifier = info.identifier();
            if let Some(reason) = failure {
                let message = format!("probe of {identifier} {reason}");
                tracing::warn!(device = %identifier, "{message}");
                unit.detach_events();
                release(&broker, &mut unit).await;
                outcome
                    .exceptions
                    .push(StateException::for_stage(DISCOVERY_STAGE, message));
                continue;
            }

            let identity: DeviceInformation = unit
                .device_information()
                .cloned()
                .unwrap_or_else(|| info.clone());

            if section.supports_model(&identity.model) {
                tracing::info!(
                    device = %identity.identifier(),
                    port = identity.port.as_deref().unwrap_or("-"),
                    "device accepted"
                );
                outcome.accepted.push(DeviceHandle::new(identity, unit));
            } else {
                tracing::warn!(device = %identity.identifier(), "model not approved, dropping device");
                set_idle(&broker, &mut unit, &CancellationToken::new()).await;
                unit.detach_events();
                release(&broker, &mut unit).await;
            }
        }
    }

    outcome
}

fn describe_failure<T>(outcome: &BrokerOutcome<T>, timeout_ms: u64) -> String {
    match outcome {
        BrokerOutcome::Success(_) => "succeeded".to_string(),
        BrokerOutcome::TimedOut => format!("timed out after {timeout_ms} ms"),
        BrokerOutcome::Cancelled => "cancelled".to_string(),
        BrokerOutcome::Faulted(err) => format!("failed: {err}"),
    }
}

async fn set_idle(broker: &CancellationBroker, device: &mut AnyPaymentDevice, cancel: &CancellationToken) {
    let outcome = broker
        .execute_with_timeout(
            move |_| async move { device.set_idle().await },
            Duration::from_millis(DEVICE_RECOVERY_TIMEOUT),
            cancel,
        )
        .await;
    if let BrokerOutcome::Faulted(err) = outcome {
        tracing::debug!(error = %err, "set idle failed");
    }
}

// Runs under its own token: a cancelled session must still release the unit.
async fn release(broker: &CancellationBroker, device: &mut AnyPaymentDevice) {
    let outcome = broker
        .execute_with_timeout(
            move |_| async move { device.disconnect().await },
            Duration::from_millis(DEVICE_RECOVERY_TIMEOUT),
            &CancellationToken::new(),
        )
        .await;
    if let BrokerOutcome::Faulted(err) = outcome {
        tracing::debug!(error = %err, "disconnect failed");
    }
}

/// Action wrapping [`discover_and_probe`].
///
/// On success every accepted device receives a status update and is set
/// idle, then the session's target set is replaced with the accepted devices.
#[derive(Debug)]
pub struct DeviceDiscoveryAction {
    id: Uuid,
}

impl DeviceDiscoveryAction {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    pub async fn do_work(&mut self, controller: &mut SubWorkflowController) -> ActionSignal {
        let context = controller.context().clone();
        let cancel = controller.cancellation_token();

        let outcome = discover_and_probe(
            context.loader(),
            context.plugin_path(),
            context.configuration(),
            context.events(),
            &cancel,
        )
        .await;

        controller.record_exceptions(outcome.exceptions);

        if outcome.accepted.is_empty() {
            tracing::error!("no valid device found");
            return ActionSignal::Error(StateException::for_stage(
                DISCOVERY_STAGE,
                "no valid device found",
            ));
        }

        let broker = controller.cancellation_broker();
        for handle in &outcome.accepted {
            let identifier = handle.identifier();

            let device = handle.device();
            let status = broker
                .execute_with_timeout(
                    move |token| async move {
                        let request = LinkRequest::new(RequestActionType::GetStatus);
                        device.lock().await.get_status(request, token).await
                    },
                    Duration::from_millis(GET_STATUS_TIMEOUT),
                    &cancel,
                )
                .await;
            match status {
                BrokerOutcome::Success(_) => {
                    tracing::info!(device = %identifier, "device status updated");
                }
                failed => {
                    let reason = describe_failure(&failed, GET_STATUS_TIMEOUT);
                    tracing::warn!(device = %identifier, "status update {reason}");
                }
            }

            let device = handle.device();
            set_idle(&broker, &mut *device.lock().await, &cancel).await;
        }

        tracing::info!(devices = outcome.accepted.len(), "discovery complete");
        context.targets().replace(outcome.accepted).await;
        ActionSignal::Complete
    }
}

impl Default for DeviceDiscoveryAction {
    fn default() -> Self {
        Self::new()
    }
}
