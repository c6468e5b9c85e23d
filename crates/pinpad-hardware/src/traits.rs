//! Device capability trait.
//!
//! [`PaymentDevice`] is the contract between the workflow engine and a
//! manufacturer driver. Lifecycle methods (discover, probe, idle, recover,
//! disconnect) are mandatory; request methods default to
//! [`HardwareError::Unsupported`] so a driver only implements the operations
//! its terminals can perform.
//!
//! Every request method takes the request envelope by value and returns it
//! with the device's [`DeviceResponse`](pinpad_core::DeviceResponse) appended.
//! Each call also receives a [`CancellationToken`]; drivers should stop
//! waiting on the terminal once it fires.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. Dynamic dispatch goes
//! through the [`AnyPaymentDevice`](crate::devices::AnyPaymentDevice) enum.

#![allow(async_fn_in_trait)]

use crate::error::{HardwareError, Result};
use crate::events::DeviceEventPublisher;
use crate::types::{DeviceInformation, ProbeOutcome};
use pinpad_core::{LinkRequest, Manufacturer, ManufacturerSection};
use tokio_util::sync::CancellationToken;

/// Payment terminal abstraction.
///
/// A value of an implementing type starts life as a manufacturer *template*
/// returned by a plugin loader. Discovery calls
/// [`discover_devices`](PaymentDevice::discover_devices) on the template and
/// then [`fresh_instance`](PaymentDevice::fresh_instance) once per physical
/// unit, so each unit owns its own connection state.
///
/// # Examples
///
/// ```no_run
/// use pinpad_core::{LinkRequest, RequestActionType};
/// use pinpad_hardware::traits::PaymentDevice;
/// use pinpad_hardware::Result;
/// use tokio_util::sync::CancellationToken;
///
/// async fn status<D: PaymentDevice>(device: &mut D) -> Result<LinkRequest> {
///     let request = LinkRequest::new(RequestActionType::GetStatus);
///     device.get_status(request, CancellationToken::new()).await
/// }
/// ```
pub trait PaymentDevice: Send + Sync + Sized {
    /// Manufacturer served by this driver.
    fn manufacturer(&self) -> Manufacturer;

    /// Identity of the connected unit, once probed.
    fn device_information(&self) -> Option<&DeviceInformation>;

    /// Create an unconnected instance sharing this template's driver settings.
    fn fresh_instance(&self) -> Self;

    /// Start forwarding device events to `publisher`.
    fn attach_events(&mut self, publisher: DeviceEventPublisher);

    /// Stop forwarding device events.
    fn detach_events(&mut self);

    /// Enumerate physically present units for this manufacturer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying bus cannot be enumerated.
    async fn discover_devices(&mut self) -> Result<Vec<DeviceInformation>>;

    /// Connect to `info` and confirm the terminal's identity.
    ///
    /// An inactive outcome is a normal result (nothing answered); an error
    /// means the probe itself failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt fails.
    async fn probe(
        &mut self,
        section: &ManufacturerSection,
        info: &DeviceInformation,
        cancel: CancellationToken,
    ) -> Result<ProbeOutcome>;

    /// Return the terminal to its idle screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal rejects the command.
    async fn set_idle(&mut self) -> Result<()>;

    /// Attempt to bring a misbehaving terminal back to a known-good state.
    ///
    /// Returns `true` when the terminal answered after recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the recovery sequence could not be issued.
    async fn recover(&mut self, cancel: CancellationToken) -> Result<bool>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the port could not be closed cleanly.
    async fn disconnect(&mut self) -> Result<()>;

    /// Reboot the terminal so that a pending configuration change applies.
    async fn reboot_device(&mut self, _cancel: CancellationToken) -> Result<()> {
        Err(HardwareError::unsupported("reboot_device"))
    }

    /// Query terminal status.
    async fn get_status(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("get_status"))
    }

    /// Report the terminal's security configuration (key slots, on-guard state).
    async fn get_security_configuration(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("get_security_configuration"))
    }

    /// Report the EMV kernel checksum.
    async fn get_emv_kernel_checksum(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("get_emv_kernel_checksum"))
    }

    /// Load configuration packages.
    async fn configuration(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("configuration"))
    }

    /// Apply a feature enablement token.
    async fn feature_enablement_token(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("feature_enablement_token"))
    }

    /// Lock configuration slot 0.
    async fn lock_config_0(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("lock_config_0"))
    }

    /// Lock configuration slot 8.
    async fn lock_config_8(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("lock_config_8"))
    }

    /// Unlock the device configuration.
    async fn unlock_config(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("unlock_config"))
    }

    /// Replace the HMAC keys.
    async fn update_hmac_keys(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("update_hmac_keys"))
    }

    /// Compute an HMAC over the request message.
    async fn generate_hmac(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("generate_hmac"))
    }

    /// Replace the idle screen image.
    async fn update_idle_screen(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("update_idle_screen"))
    }

    /// Render a custom screen.
    async fn display_custom_screen(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("display_custom_screen"))
    }

    /// Schedule the mandatory 24-hour reboot.
    async fn reboot_24_hour(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("reboot_24_hour"))
    }

    /// Set the terminal clock.
    async fn set_terminal_date_time(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("set_terminal_date_time"))
    }

    /// Report VIPA component versions.
    async fn vipa_versions(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("vipa_versions"))
    }

    /// Report EMV kernel versions.
    async fn report_emv_kernel_versions(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("report_emv_kernel_versions"))
    }

    /// Produce the Sphere health file; the response carries its path.
    async fn get_sphere_health_file(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("get_sphere_health_file"))
    }

    /// Collect a manually keyed card number.
    async fn manual_card_entry(
        &mut self,
        _request: LinkRequest,
        _cancel: CancellationToken,
    ) -> Result<LinkRequest> {
        Err(HardwareError::unsupported("manual_card_entry"))
    }
}
