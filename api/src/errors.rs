use serde::Serialize;
use thiserror::Error;

/// A single field that failed validation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every violated field from one validation pass, not just the first.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Record not found")]
    NotFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Ambiguous device name {name:?}: {matches} rows match")]
    AmbiguousDevice { name: String, matches: usize },

    #[error("No devices available")]
    NoDevicesAvailable,

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
