//! Enum wrapper for payment device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn PaymentDevice>`
//! is not available. [`AnyPaymentDevice`] provides concrete dispatch instead;
//! plugin loaders return it and the workflow engine stores it.
//!
//! # Examples
//!
//! ```
//! use pinpad_hardware::devices::AnyPaymentDevice;
//! use pinpad_hardware::simulator::SimulatorDevice;
//! use pinpad_hardware::traits::PaymentDevice;
//!
//! let (simulator, _handle) = SimulatorDevice::new();
//! let device = AnyPaymentDevice::Simulator(simulator);
//! assert!(device.device_information().is_none());
//! ```

use crate::error::Result;
use crate::events::DeviceEventPublisher;
use crate::simulator::SimulatorDevice;
use crate::traits::PaymentDevice;
use crate::types::{DeviceInformation, ProbeOutcome};
use pinpad_core::{LinkRequest, Manufacturer, ManufacturerSection};
use tokio_util::sync::CancellationToken;

/// Enum wrapper for payment device dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyPaymentDevice {
    /// Scripted simulator.
    Simulator(SimulatorDevice),

    /// Placeholder for a manufacturer with no driver installed.
    NoDevice(NullDevice),
}

macro_rules! dispatch_request {
    ($($method:ident),* $(,)?) => {
        $(
            async fn $method(
                &mut self,
                request: LinkRequest,
                cancel: CancellationToken,
            ) -> Result<LinkRequest> {
                match self {
                    Self::Simulator(device) => device.$method(request, cancel).await,
                    Self::NoDevice(device) => device.$method(request, cancel).await,
                }
            }
        )*
    };
}

impl PaymentDevice for AnyPaymentDevice {
    fn manufacturer(&self) -> Manufacturer {
        match self {
            Self::Simulator(device) => device.manufacturer(),
            Self::NoDevice(device) => device.manufacturer(),
        }
    }

    fn device_information(&self) -> Option<&DeviceInformation> {
        match self {
            Self::Simulator(device) => device.device_information(),
            Self::NoDevice(device) => device.device_information(),
        }
    }

    fn fresh_instance(&self) -> Self {
        match self {
            Self::Simulator(device) => Self::Simulator(device.fresh_instance()),
            Self::NoDevice(device) => Self::NoDevice(device.fresh_instance()),
        }
    }

    fn attach_events(&mut self, publisher: DeviceEventPublisher) {
        match self {
            Self::Simulator(device) => device.attach_events(publisher),
            Self::NoDevice(device) => device.attach_events(publisher),
        }
    }

    fn detach_events(&mut self) {
        match self {
            Self::Simulator(device) => device.detach_events(),
            Self::NoDevice(device) => device.detach_events(),
        }
    }

    async fn discover_devices(&mut self) -> Result<Vec<DeviceInformation>> {
        match self {
            Self::Simulator(device) => device.discover_devices().await,
            Self::NoDevice(device) => device.discover_devices().await,
        }
    }

    async fn probe(
        &mut self,
        section: &ManufacturerSection,
        info: &DeviceInformation,
        cancel: CancellationToken,
    ) -> Result<ProbeOutcome> {
        match self {
            Self::Simulator(device) => device.probe(section, info, cancel).await,
            Self::NoDevice(device) => device.probe(section, info, cancel).await,
        }
    }

    async fn set_idle(&mut self) -> Result<()> {
        match self {
            Self::Simulator(device) => device.set_idle().await,
            Self::NoDevice(device) => device.set_idle().await,
        }
    }

    async fn recover(&mut self, cancel: CancellationToken) -> Result<bool> {
        match self {
            Self::Simulator(device) => device.recover(cancel).await,
            Self::NoDevice(device) => device.recover(cancel).await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Simulator(device) => device.disconnect().await,
            Self::NoDevice(device) => device.disconnect().await,
        }
    }

    async fn reboot_device(&mut self, cancel: CancellationToken) -> Result<()> {
        match self {
            Self::Simulator(device) => device.reboot_device(cancel).await,
            Self::NoDevice(device) => device.reboot_device(cancel).await,
        }
    }

    dispatch_request!(
        get_status,
        get_security_configuration,
        get_emv_kernel_checksum,
        configuration,
        feature_enablement_token,
        lock_config_0,
        lock_config_8,
        unlock_config,
        update_hmac_keys,
        generate_hmac,
        update_idle_screen,
        display_custom_screen,
        reboot_24_hour,
        set_terminal_date_time,
        vipa_versions,
        report_emv_kernel_versions,
        get_sphere_health_file,
        manual_card_entry,
    );
}

impl From<SimulatorDevice> for AnyPaymentDevice {
    fn from(device: SimulatorDevice) -> Self {
        Self::Simulator(device)
    }
}

impl From<NullDevice> for AnyPaymentDevice {
    fn from(device: NullDevice) -> Self {
        Self::NoDevice(device)
    }
}

/// Driver that never finds a terminal.
///
/// Loaded for manufacturers whose plugin is declared without a driver.
/// Discovery skips [`Manufacturer::NoDevice`] entirely; for any other
/// manufacturer this driver reports no units.
#[derive(Debug, Clone)]
pub struct NullDevice {
    manufacturer: Manufacturer,
}

impl NullDevice {
    pub fn new(manufacturer: Manufacturer) -> Self {
        Self { manufacturer }
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new(Manufacturer::NoDevice)
    }
}

impl PaymentDevice for NullDevice {
    fn manufacturer(&self) -> Manufacturer {
        self.manufacturer
    }

    fn device_information(&self) -> Option<&DeviceInformation> {
        None
    }

    fn fresh_instance(&self) -> Self {
        self.clone()
    }

    fn attach_events(&mut self, _publisher: DeviceEventPublisher) {}

    fn detach_events(&mut self) {}

    async fn discover_devices(&mut self) -> Result<Vec<DeviceInformation>> {
        Ok(Vec::new())
    }

    async fn probe(
        &mut self,
        _section: &ManufacturerSection,
        info: &DeviceInformation,
        _cancel: CancellationToken,
    ) -> Result<ProbeOutcome> {
        Ok(ProbeOutcome::inactive(format!(
            "no driver installed for {}",
            info.manufacturer
        )))
    }

    async fn set_idle(&mut self) -> Result<()> {
        Ok(())
    }

    async fn recover(&mut self, _cancel: CancellationToken) -> Result<bool> {
        Ok(false)
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}
