//! Error types for vsnd.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsndError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Stream configuration errors
    #[error("Invalid stream configuration: {message}")]
    ConfigInvalid { message: String },

    // Sink errors
    #[error("Sink unavailable at {path}: {message}")]
    SinkUnavailable { path: String, message: String },

    // Resource errors
    #[error("Resource exhausted: {message}")]
    ResourceExhausted { message: String },

    // Producer input errors
    #[error("Unsupported audio input: {message}")]
    AudioFile { message: String },

    // Trigger errors
    #[error("Invalid trigger command: {command}")]
    InvalidCommand { command: String },

    // Lifecycle errors
    #[error("Device {id} already has an open stream")]
    DeviceBusy { id: u32 },

    #[error("Unknown device: {id}")]
    UnknownDevice { id: u32 },

    #[error("No device could be registered")]
    NoDevices,

    #[error("Stream has not been prepared")]
    NotPrepared,

    #[error("Stream is closed")]
    StreamClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VsndError {
    pub(crate) fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VsndError>;
