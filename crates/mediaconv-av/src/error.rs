//! Error types for mediaconv-av.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while invoking external tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("{tool} not installed")]
    ToolNotFound { tool: String },

    /// An external tool ran but failed.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// An external tool exceeded its wall-clock budget and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported operation or format.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(tool: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            tool: tool.into(),
            timeout,
        }
    }
}
