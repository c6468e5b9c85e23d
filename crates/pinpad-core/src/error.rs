use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Request errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    // Device errors
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
