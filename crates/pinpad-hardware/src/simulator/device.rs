//! Simulated payment terminal.

use super::script::{CallJournal, ScriptedBehavior, SimulatorScript};
use crate::error::{HardwareError, Result};
use crate::events::DeviceEventPublisher;
use crate::traits::PaymentDevice;
use crate::types::{DeviceInformation, ProbeOutcome};
use pinpad_core::{
    DeviceEvent, DeviceResponse, LinkRequest, Manufacturer, ManufacturerSection, RequestActionType,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Default model reported by simulated units.
pub const SIMULATOR_MODEL: &str = "SIM-1000";

/// Simulated payment terminal driver.
///
/// A simulator can impersonate any manufacturer, which lets tests build
/// multi-manufacturer discovery scenarios without hardware. Behaviour is
/// scripted through the [`SimulatorHandle`] returned alongside the device;
/// units created by [`fresh_instance`](PaymentDevice::fresh_instance) share
/// the same script and handle.
///
/// # Examples
///
/// ```
/// use pinpad_core::{LinkRequest, Manufacturer, ManufacturerSection, RequestActionType};
/// use pinpad_hardware::simulator::SimulatorDevice;
/// use pinpad_hardware::traits::PaymentDevice;
/// use pinpad_hardware::DeviceInformation;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> pinpad_hardware::Result<()> {
///     let info = DeviceInformation::new(Manufacturer::Simulator, "SIM-1000", "SIM-01");
///     let (template, _handle) = SimulatorDevice::with_units(Manufacturer::Simulator, vec![info.clone()]);
///
///     let mut unit = template.fresh_instance();
///     let outcome = unit
///         .probe(&ManufacturerSection::new(1), &info, CancellationToken::new())
///         .await?;
///     assert!(outcome.active);
///
///     let request = LinkRequest::new(RequestActionType::GetStatus);
///     let response = unit.get_status(request, CancellationToken::new()).await?;
///     assert_eq!(response.responses.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimulatorDevice {
    manufacturer: Manufacturer,
    script: Arc<Mutex<SimulatorScript>>,
    journal: CallJournal,
    attached: Arc<AtomicUsize>,
    information: Option<DeviceInformation>,
    connected: bool,
    events: Option<DeviceEventPublisher>,
}

impl SimulatorDevice {
    /// Create a simulator with a single default unit.
    pub fn new() -> (Self, SimulatorHandle) {
        let info = DeviceInformation::new(Manufacturer::Simulator, SIMULATOR_MODEL, "SIM-0001")
            .with_firmware_version("1.0.0");
        Self::with_units(Manufacturer::Simulator, vec![info])
    }

    /// Create a simulator impersonating `manufacturer` with the given units.
    pub fn with_units(
        manufacturer: Manufacturer,
        units: Vec<DeviceInformation>,
    ) -> (Self, SimulatorHandle) {
        Self::with_journal(manufacturer, units, CallJournal::new())
    }

    /// Create a simulator that records calls into a shared journal.
    pub fn with_journal(
        manufacturer: Manufacturer,
        units: Vec<DeviceInformation>,
        journal: CallJournal,
    ) -> (Self, SimulatorHandle) {
        let script = Arc::new(Mutex::new(SimulatorScript::new(units)));
        let attached = Arc::new(AtomicUsize::new(0));

        let device = Self {
            manufacturer,
            script: Arc::clone(&script),
            journal: journal.clone(),
            attached: Arc::clone(&attached),
            information: None,
            connected: false,
            events: None,
        };

        let handle = SimulatorHandle {
            script,
            journal,
            attached,
        };

        (device, handle)
    }

    /// Check whether this unit currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn record(&self, operation: &str) {
        let serial = self.information.as_ref().map(|i| i.serial_number.clone());
        self.journal.record(self.manufacturer, serial, operation).await;
    }

    async fn wait(delay: Option<Duration>, cancel: &CancellationToken, operation: &str) -> Result<()> {
        let Some(delay) = delay else {
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(HardwareError::cancelled(operation)),
        }
    }

    async fn respond(
        &mut self,
        action: RequestActionType,
        mut request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        let operation = action.as_str().to_ascii_lowercase();
        self.record(&operation).await;

        let info = match (&self.information, self.connected) {
            (Some(info), true) => info.clone(),
            _ => return Err(HardwareError::disconnected(self.manufacturer.as_str())),
        };

        let behavior: ScriptedBehavior = self.script.lock().await.behavior(action);

        if let (Some(event), Some(events)) = (behavior.event, &self.events) {
            events.publish(event);
        }

        Self::wait(behavior.delay, &cancel, &operation).await?;

        if let Some(fault) = behavior.fault {
            return Err(fault);
        }

        let data = behavior
            .data
            .unwrap_or_else(|| builtin_data(action, &info, &request));

        let mut response = DeviceResponse::success(info.identifier(), data);
        response.reboot_required = behavior.reboot_required;
        response.artifact = behavior.artifact;
        request.responses.push(response);

        Ok(request)
    }
}

fn builtin_data(
    action: RequestActionType,
    info: &DeviceInformation,
    request: &LinkRequest,
) -> serde_json::Value {
    let payload = &request.payload;
    match action {
        RequestActionType::GetStatus => json!({
            "status": "idle",
            "model": info.model,
            "firmware_version": info.firmware_version,
        }),
        RequestActionType::GetSecurityConfiguration => json!({
            "on_guard": true,
            "key_slots": ["ADE", "DEBIT_PIN"],
            "vss_script": "SIMULATED",
        }),
        RequestActionType::GetEmvKernelChecksum => json!({ "checksum": "A1B2C3D4" }),
        RequestActionType::Configuration => json!({
            "packages_loaded": payload.configuration_packages,
        }),
        RequestActionType::FeatureEnablementToken => json!({
            "token_applied": payload.feature_token.is_some(),
        }),
        RequestActionType::LockDeviceConfig0 => json!({ "config_slot": 0, "locked": true }),
        RequestActionType::LockDeviceConfig8 => json!({ "config_slot": 8, "locked": true }),
        RequestActionType::UnlockDeviceConfig => json!({ "locked": false }),
        RequestActionType::UpdateHmacKeys => json!({ "hmac_keys_updated": true }),
        RequestActionType::GenerateHmac => json!({
            "slot": payload.hmac_key_slot.unwrap_or(0),
            "hmac": format!("SIM-HMAC-{}", payload.hmac_message.as_deref().unwrap_or("").len()),
        }),
        RequestActionType::UpdateIdleScreen => json!({ "idle_screen": payload.idle_screen }),
        RequestActionType::DisplayCustomScreen => json!({
            "template": payload.custom_screen.as_ref().map(|s| s.template.clone()),
        }),
        RequestActionType::Reboot24Hour => json!({ "reboot_time": "02:00:00" }),
        RequestActionType::SetTerminalDateTime => json!({
            "terminal_date_time": payload.terminal_date_time.map(|t| t.to_rfc3339()),
        }),
        RequestActionType::VipaVersions => json!({
            "vipa": "6.8.2.17",
            "os": "SIM-OS 1.0",
            "firmware_version": info.firmware_version,
        }),
        RequestActionType::ReportEmvKernelVersions => json!({
            "contact": "EMV L2 4.3i",
            "contactless": "EMV L2 C-3 2.10",
        }),
        RequestActionType::GetSphereHealthFile => json!({ "health_file": "requested" }),
        RequestActionType::ManualCardEntry => json!({ "prompted": payload.manual_entry_prompt }),
        RequestActionType::AbortCommand | RequestActionType::Unknown => serde_json::Value::Null,
    }
}

impl Default for SimulatorDevice {
    fn default() -> Self {
        Self::new().0
    }
}

impl PaymentDevice for SimulatorDevice {
    fn manufacturer(&self) -> Manufacturer {
        self.manufacturer
    }

    fn device_information(&self) -> Option<&DeviceInformation> {
        self.information.as_ref()
    }

    fn fresh_instance(&self) -> Self {
        Self {
            manufacturer: self.manufacturer,
            script: Arc::clone(&self.script),
            journal: self.journal.clone(),
            attached: Arc::clone(&self.attached),
            information: None,
            connected: false,
            events: None,
        }
    }

    fn attach_events(&mut self, publisher: DeviceEventPublisher) {
        if self.events.replace(publisher).is_none() {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn detach_events(&mut self) {
        if self.events.take().is_some() {
            self.attached.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn discover_devices(&mut self) -> Result<Vec<DeviceInformation>> {
        self.record("discover_devices").await;
        let script = self.script.lock().await;
        match &script.discovery_fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(script.units.clone()),
        }
    }

    async fn probe(
        &mut self,
        section: &ManufacturerSection,
        info: &DeviceInformation,
        cancel: CancellationToken,
    ) -> Result<ProbeOutcome> {
        self.journal
            .record(self.manufacturer, Some(info.serial_number.clone()), "probe")
            .await;

        let (delay, fault, inactive) = {
            let script = self.script.lock().await;
            (
                script.probe_delay,
                script.probe_fault.clone(),
                script.inactive_serials.contains(&info.serial_number),
            )
        };

        Self::wait(delay, &cancel, "probe").await?;

        if let Some(fault) = fault {
            return Err(fault);
        }

        if inactive {
            return Ok(ProbeOutcome::inactive(format!(
                "{} did not answer",
                info.serial_number
            )));
        }

        let mut connected = info.clone();
        if connected.port.is_none() {
            connected.port = section.port.clone();
        }
        self.information = Some(connected);
        self.connected = true;

        Ok(ProbeOutcome::active())
    }

    async fn set_idle(&mut self) -> Result<()> {
        self.record("set_idle").await;
        Ok(())
    }

    async fn recover(&mut self, cancel: CancellationToken) -> Result<bool> {
        self.record("recover").await;
        let (delay, recovered) = {
            let script = self.script.lock().await;
            (script.probe_delay, script.recover_result)
        };

        Self::wait(delay, &cancel, "recover").await?;

        if recovered {
            self.connected = self.information.is_some();
            if let Some(events) = &self.events {
                events.publish(DeviceEvent::DevicePlugged);
            }
        }
        Ok(recovered)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.record("disconnect").await;
        self.connected = false;
        Ok(())
    }

    async fn reboot_device(&mut self, cancel: CancellationToken) -> Result<()> {
        self.record("reboot_device").await;
        let fault = self.script.lock().await.reboot_fault.clone();
        if cancel.is_cancelled() {
            return Err(HardwareError::cancelled("reboot_device"));
        }
        match fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    async fn get_status(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::GetStatus, request, cancel).await
    }

    async fn get_security_configuration(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::GetSecurityConfiguration, request, cancel)
            .await
    }

    async fn get_emv_kernel_checksum(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::GetEmvKernelChecksum, request, cancel)
            .await
    }

    async fn configuration(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::Configuration, request, cancel).await
    }

    async fn feature_enablement_token(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::FeatureEnablementToken, request, cancel)
            .await
    }

    async fn lock_config_0(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::LockDeviceConfig0, request, cancel).await
    }

    async fn lock_config_8(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::LockDeviceConfig8, request, cancel).await
    }

    async fn unlock_config(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::UnlockDeviceConfig, request, cancel).await
    }

    async fn update_hmac_keys(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::UpdateHmacKeys, request, cancel).await
    }

    async fn generate_hmac(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::GenerateHmac, request, cancel).await
    }

    async fn update_idle_screen(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::UpdateIdleScreen, request, cancel).await
    }

    async fn display_custom_screen(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::DisplayCustomScreen, request, cancel)
            .await
    }

    async fn reboot_24_hour(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::Reboot24Hour, request, cancel).await
    }

    async fn set_terminal_date_time(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::SetTerminalDateTime, request, cancel)
            .await
    }

    async fn vipa_versions(&mut self, request: LinkRequest, cancel: CancellationToken) -> Result<LinkRequest> {
        self.respond(RequestActionType::VipaVersions, request, cancel).await
    }

    async fn report_emv_kernel_versions(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::ReportEmvKernelVersions, request, cancel)
            .await
    }

    async fn get_sphere_health_file(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::GetSphereHealthFile, request, cancel)
            .await
    }

    async fn manual_card_entry(
        &mut self,
        request: LinkRequest,
        cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        self.respond(RequestActionType::ManualCardEntry, request, cancel).await
    }
}

/// Handle for scripting a simulator.
///
/// Cloneable; every clone scripts the same simulator template and all of its
/// units.
///
/// # Examples
///
/// ```
/// use pinpad_core::RequestActionType;
/// use pinpad_hardware::simulator::SimulatorDevice;
/// use pinpad_hardware::HardwareError;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let (_device, handle) = SimulatorDevice::new();
///
///     handle.delay(RequestActionType::GetStatus, Duration::from_secs(30)).await;
///     handle
///         .fail(RequestActionType::VipaVersions, HardwareError::device_status(0x9F41, "busy"))
///         .await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    script: Arc<Mutex<SimulatorScript>>,
    journal: CallJournal,
    attached: Arc<AtomicUsize>,
}

impl SimulatorHandle {
    /// Add a unit reported by discovery.
    pub async fn add_unit(&self, info: DeviceInformation) {
        self.script.lock().await.units.push(info);
    }

    /// Make discovery fail.
    pub async fn fail_discovery(&self, fault: HardwareError) {
        self.script.lock().await.discovery_fault = Some(fault);
    }

    /// Make probing the unit with `serial_number` report an inactive device.
    pub async fn mark_inactive(&self, serial_number: impl Into<String>) {
        self.script
            .lock()
            .await
            .inactive_serials
            .insert(serial_number.into());
    }

    /// Delay probe and recovery answers.
    pub async fn delay_probe(&self, delay: Duration) {
        self.script.lock().await.probe_delay = Some(delay);
    }

    /// Make probing fail with `fault`.
    pub async fn fail_probe(&self, fault: HardwareError) {
        self.script.lock().await.probe_fault = Some(fault);
    }

    /// Set the result reported by recovery.
    pub async fn set_recover_result(&self, recovered: bool) {
        self.script.lock().await.recover_result = recovered;
    }

    /// Make the follow-up reboot fail.
    pub async fn fail_reboot(&self, fault: HardwareError) {
        self.script.lock().await.reboot_fault = Some(fault);
    }

    /// Delay answers to `action`.
    pub async fn delay(&self, action: RequestActionType, delay: Duration) {
        self.script.lock().await.behavior_mut(action).delay = Some(delay);
    }

    /// Answer `action` with `fault`.
    pub async fn fail(&self, action: RequestActionType, fault: HardwareError) {
        self.script.lock().await.behavior_mut(action).fault = Some(fault);
    }

    /// Report that `action` needs a reboot to take effect.
    pub async fn require_reboot(&self, action: RequestActionType) {
        self.script.lock().await.behavior_mut(action).reboot_required = true;
    }

    /// Raise `event` while `action` is in progress.
    pub async fn raise_event(&self, action: RequestActionType, event: DeviceEvent) {
        self.script.lock().await.behavior_mut(action).event = Some(event);
    }

    /// Attach `artifact` to responses for `action`.
    pub async fn produce_artifact(&self, action: RequestActionType, artifact: impl Into<PathBuf>) {
        self.script.lock().await.behavior_mut(action).artifact = Some(artifact.into());
    }

    /// Answer `action` with `data` instead of the built-in answer.
    pub async fn respond_with(&self, action: RequestActionType, data: serde_json::Value) {
        self.script.lock().await.behavior_mut(action).data = Some(data);
    }

    /// Journal of calls made against this simulator's units.
    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// Number of operations of the given name recorded so far.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.journal.calls_for(operation).await.len()
    }

    /// Number of units currently forwarding events.
    pub fn attached_units(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }
}
