//! Error types for pointcull

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing spatial index for {0} points")]
    MissingSpatialIndex(usize),

    #[error("Missing effect type: {0}")]
    MissingEffectType(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
