//! Error types for the grid explorer

use thiserror::Error;

/// Explorer error type
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

impl From<toml::de::Error> for ExplorerError {
    fn from(e: toml::de::Error) -> Self {
        ExplorerError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(e: serde_json::Error) -> Self {
        ExplorerError::Telemetry(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
