#![forbid(unsafe_code)]

//! Error taxonomy shared by the library modules.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request data, including disallowed hosts.
    #[error("{0}")]
    InvalidInput(String),

    /// No matching format, unknown download identifier or missing file.
    #[error("{0}")]
    NotFound(String),

    /// A download with the same identifier is still in flight.
    #[error("{0}")]
    Conflict(String),

    /// The extraction or transfer collaborator failed.
    #[error("extractor failed: {0}")]
    Upstream(String),

    #[error("unexpected error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}
