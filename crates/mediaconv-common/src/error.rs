//! Common error types used throughout mediaconv.
//!
//! This module provides a unified error type that covers common failure cases
//! such as not found, invalid input, unsupported media, database errors, and
//! I/O failures.

/// Common error type for mediaconv.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested item was not found.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The file type or format is not supported.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Unsupported error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was raised by boundary validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Unsupported(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
