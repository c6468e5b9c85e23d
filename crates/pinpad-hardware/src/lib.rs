//! Payment terminal driver layer.
//!
//! This crate defines the [`PaymentDevice`] trait that every manufacturer
//! driver implements, the enum wrapper used to dispatch over drivers, the
//! device event channel, and a scriptable simulator for development and
//! testing without terminals attached.
//!
//! # Design
//!
//! - **Async-first**: all terminal I/O uses native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Cancellable**: every terminal call receives a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken).
//! - **Enum dispatch**: [`AnyPaymentDevice`] replaces `Box<dyn PaymentDevice>`.
//! - **Thread-safe**: drivers are `Send + Sync` so the workflow engine can
//!   share them across Tokio tasks.
//!
//! # Example
//!
//! ```
//! use pinpad_core::{LinkRequest, Manufacturer, ManufacturerSection, RequestActionType};
//! use pinpad_hardware::{AnyPaymentDevice, DeviceInformation, PaymentDevice};
//! use pinpad_hardware::simulator::SimulatorDevice;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pinpad_hardware::Result<()> {
//!     let (simulator, _handle) = SimulatorDevice::new();
//!     let mut template = AnyPaymentDevice::from(simulator);
//!
//!     for info in template.discover_devices().await? {
//!         let mut unit = template.fresh_instance();
//!         let outcome = unit
//!             .probe(&ManufacturerSection::new(1), &info, CancellationToken::new())
//!             .await?;
//!         if outcome.active {
//!             let request = LinkRequest::new(RequestActionType::GetStatus);
//!             let request = unit.get_status(request, CancellationToken::new()).await?;
//!             println!("{}", request.to_json().unwrap_or_default());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod devices;
pub mod error;
pub mod events;
pub mod simulator;
pub mod traits;
pub mod types;

pub use devices::{AnyPaymentDevice, NullDevice};
pub use error::{HardwareError, Result};
pub use events::{DeviceEventChannel, DeviceEventPublisher};
pub use traits::PaymentDevice;
pub use types::{DeviceInformation, ProbeOutcome};
