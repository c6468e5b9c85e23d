//! Scripted behaviour shared between a simulator template, its units and
//! its handle.

use crate::error::HardwareError;
use crate::types::DeviceInformation;
use pinpad_core::{DeviceEvent, Manufacturer, RequestActionType};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How the simulator answers one request action.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBehavior {
    /// Time the simulated terminal takes to answer.
    pub delay: Option<Duration>,

    /// Error returned instead of a response.
    pub fault: Option<HardwareError>,

    /// Report that the change needs a reboot.
    pub reboot_required: bool,

    /// Event raised while the call is in progress.
    pub event: Option<DeviceEvent>,

    /// Artifact path placed on the response.
    pub artifact: Option<PathBuf>,

    /// Response data overriding the built-in answer.
    pub data: Option<serde_json::Value>,
}

/// One recorded call against a simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorCall {
    pub manufacturer: Manufacturer,
    pub serial_number: Option<String>,
    pub operation: String,
}

/// Call log that several simulators can share to observe global ordering.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<SimulatorCall>>>,
}

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn record(
        &self,
        manufacturer: Manufacturer,
        serial_number: Option<String>,
        operation: &str,
    ) {
        self.calls.lock().await.push(SimulatorCall {
            manufacturer,
            serial_number,
            operation: operation.to_string(),
        });
    }

    /// Snapshot of every call recorded so far, oldest first.
    pub async fn calls(&self) -> Vec<SimulatorCall> {
        self.calls.lock().await.clone()
    }

    /// Recorded calls for one operation, oldest first.
    pub async fn calls_for(&self, operation: &str) -> Vec<SimulatorCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct SimulatorScript {
    pub(crate) units: Vec<DeviceInformation>,
    pub(crate) discovery_fault: Option<HardwareError>,
    pub(crate) inactive_serials: HashSet<String>,
    pub(crate) probe_delay: Option<Duration>,
    pub(crate) probe_fault: Option<HardwareError>,
    pub(crate) recover_result: bool,
    pub(crate) reboot_fault: Option<HardwareError>,
    pub(crate) behaviors: HashMap<RequestActionType, ScriptedBehavior>,
}

impl SimulatorScript {
    pub(crate) fn new(units: Vec<DeviceInformation>) -> Self {
        Self {
            units,
            discovery_fault: None,
            inactive_serials: HashSet::new(),
            probe_delay: None,
            probe_fault: None,
            recover_result: true,
            reboot_fault: None,
            behaviors: HashMap::new(),
        }
    }

    pub(crate) fn behavior(&self, action: RequestActionType) -> ScriptedBehavior {
        self.behaviors.get(&action).cloned().unwrap_or_default()
    }

    pub(crate) fn behavior_mut(&mut self, action: RequestActionType) -> &mut ScriptedBehavior {
        self.behaviors.entry(action).or_default()
    }
}
