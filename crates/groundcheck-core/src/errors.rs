//! Error types for the groundcheck core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyConnectionError, PyIOError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Failure reported by an external collaborator (graph store or vector search).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or refused the request.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered, but with a payload of unexpected shape.
    #[error("malformed collaborator response: {0}")]
    Malformed(String),
}

impl From<rusqlite::Error> for CollaboratorError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                CollaboratorError::Malformed(err.to_string())
            }
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}

/// Top-level error enum for the groundcheck core library.
#[derive(Debug, thiserror::Error)]
pub enum GroundcheckError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Graph store unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Vector search degraded: {0}")]
    CollaboratorDegraded(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GroundcheckError {
    /// Stable machine-readable name used in the failure envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            GroundcheckError::Parse { .. } => "parse_error",
            GroundcheckError::CollaboratorUnavailable(_) => "collaborator_unavailable",
            GroundcheckError::CollaboratorDegraded(_) => "collaborator_degraded",
            GroundcheckError::MalformedResponse(_) => "malformed_response",
            GroundcheckError::Cancelled => "cancelled",
            GroundcheckError::Io(_) => "io_error",
            GroundcheckError::Sqlite(_) => "storage_error",
            GroundcheckError::Json(_) => "serialization_error",
        }
    }
}

#[cfg(feature = "python")]
impl From<GroundcheckError> for PyErr {
    fn from(err: GroundcheckError) -> PyErr {
        match &err {
            GroundcheckError::Parse { .. } => PyValueError::new_err(err.to_string()),
            GroundcheckError::CollaboratorUnavailable(_)
            | GroundcheckError::CollaboratorDegraded(_) => {
                PyConnectionError::new_err(err.to_string())
            }
            GroundcheckError::MalformedResponse(_) | GroundcheckError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            GroundcheckError::Cancelled | GroundcheckError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            GroundcheckError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type GroundcheckResult<T> = Result<T, GroundcheckError>;
