//! Ошибки пайплайна

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing field `{field}` in record {row}")]
    MissingField { field: &'static str, row: usize },

    #[error("Degenerate column `{0}`: zero standard deviation")]
    DegenerateColumn(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Division by zero: baseline {0} is zero")]
    DivisionByZero(&'static str),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn shape(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn invalid(name: &str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}
