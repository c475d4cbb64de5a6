//! Error types for trackforged-media.

use thiserror::Error;

/// Result type for trackforged-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for trackforged-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The stream manifest could not be decoded into a fetchable form.
    #[error("Manifest decode error: {0}")]
    ManifestDecode(String),

    /// A custom tag atom did not have the expected `----`/`mean`/`name`/`data` layout.
    #[error("Malformed tag atom: {0}")]
    MalformedAtom(String),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferUnderflow { need: usize, have: usize },
}

impl Error {
    /// Create a manifest decode error.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::ManifestDecode(msg.into())
    }

    /// Create a malformed atom error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedAtom(msg.into())
    }
}
