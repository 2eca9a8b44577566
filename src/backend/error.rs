//! Errors raised by backend adapters

use crate::backend::BackendKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// A remote call did not answer within the configured deadline
    #[error("{message}")]
    Timeout { message: String },

    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: BackendKind,
        operation: &'static str,
    },

    #[error("No document with id '{id}'")]
    NotFound { id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request Error: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request Error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No backend registered for '{0}'")]
    UnknownBackend(BackendKind),

    #[error("Dataset '{dataset}' is not configured for the {expected} backend")]
    ConfigMismatch {
        expected: BackendKind,
        dataset: String,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

impl BackendError {
    pub fn unsupported(backend: BackendKind, operation: &'static str) -> Self {
        BackendError::Unsupported { backend, operation }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        BackendError::NotFound { id: id.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }
}
