//! Error types for Lagoon

use thiserror::Error;

/// The main error type for Lagoon operations outside the GPU layer
#[derive(Debug, Error)]
pub enum LagoonError {
    #[error("Invalid grid size {width}x{height}: both dimensions must be at least 2")]
    InvalidGridSize { width: u32, height: u32 },

    #[error("Height data has {got} samples, expected {expected}")]
    HeightDataMismatch { expected: usize, got: usize },

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Light capacity exceeded: at most {capacity} lights")]
    LightCapacityExceeded { capacity: usize },
}

/// Result type alias for Lagoon operations
pub type Result<T> = std::result::Result<T, LagoonError>;

impl From<toml::de::Error> for LagoonError {
    fn from(err: toml::de::Error) -> Self {
        LagoonError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for LagoonError {
    fn from(err: toml::ser::Error) -> Self {
        LagoonError::TomlSerError(err.to_string())
    }
}
