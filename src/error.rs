//! Error types for scriv.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrivError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Record-level failures (terminal for one record, never for the queue)
    #[error("Audio blob missing for record {id}")]
    MissingAudio { id: String },

    #[error("Failed to decode audio: {message}")]
    DecodeFailure { message: String },

    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Inference failed: {message}")]
    InferenceFailed { message: String },

    // Store errors
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScrivError>;
