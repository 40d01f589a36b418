//! Error types for towersim

use thiserror::Error;

/// Error types for the towersim library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// State machine consistency errors.
    #[error("State machine error: {0}")]
    StateMachine(String),

    /// Measurement storage I/O errors.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// External prediction service errors. Recovered locally, never
    /// surfaced to the handover state machine.
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
