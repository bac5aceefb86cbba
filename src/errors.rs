//! Error types for the conversion and binding boundaries. Tree operations never fail.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Invalid comment metadata for comment {id}: {details}")]
    InvalidMetadata { id: i64, details: String },

    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversionError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Session registry lock was poisoned")]
    RegistryPoisoned,

    #[cfg(feature = "python")]
    #[error("Python call failed: {0}")]
    PythonError(String),
}

#[cfg(feature = "python")]
impl From<ReconcilerError> for pyo3::PyErr {
    fn from(err: ReconcilerError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for ReconcilerError {
    fn from(err: pyo3::PyErr) -> Self {
        ReconcilerError::PythonError(err.to_string())
    }
}
