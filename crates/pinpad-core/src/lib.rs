pub mod config;
pub mod constants;
pub mod error;
pub mod link;
pub mod types;

pub use config::{DalConfiguration, ManufacturerSection, SftpSettings};
pub use error::{Error, Result};
pub use link::{
    DeviceIdentifier, DeviceRequestPayload, DeviceResponse, LinkErrorValue, LinkRequest,
    ResponseStatus,
};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
