use std::time::Duration;

use thiserror::Error;

use crate::types::SearchMode;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Search mode '{0}' requires an embedding provider")]
    InvalidMode(SearchMode),

    #[error("Embedding dimension mismatch: store uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider failed: {0}")]
    Provider(String),

    #[error("Store I/O failed: {0}")]
    StoreIo(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Maps an error raised by an embedding provider. Typed errors the provider
    /// raised itself (a timeout wrapper, for instance) are passed through.
    pub fn from_provider(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(typed) => typed,
            Err(other) => Error::Provider(format!("{other:#}")),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation { field: field.into(), reason: reason.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StoreIo(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
