//! Error types for terrasem

use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticCode};

/// Main error type for terrasem operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error(
        "{} of {total} entities fall outside the observation window (first offending entity: #{})",
        .outside.len(),
        .outside.first().copied().unwrap_or_default()
    )]
    EntitiesOutsideWindow { outside: Vec<usize>, total: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Size mismatch for {what}: expected {expected} values, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{operation} is not defined for {support} support")]
    UnsupportedSupport {
        operation: &'static str,
        support: String,
    },

    /// The operation has no defensible result.
    #[error("Refused: {0}")]
    Refused(Diagnostic),

    /// An advisory diagnostic that configuration promoted to fatal.
    #[error("Escalated: {0}")]
    Escalated(Diagnostic),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_geometry(reason: impl Into<String>) -> Self {
        Error::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// Diagnostic code carried by a refusal or escalation, if any.
    pub fn diagnostic_code(&self) -> Option<DiagnosticCode> {
        match self {
            Error::Refused(d) | Error::Escalated(d) => Some(d.code),
            _ => None,
        }
    }
}

/// Result type alias for terrasem operations
pub type Result<T> = std::result::Result<T, Error>;
