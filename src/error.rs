//! Error types for the speech harness

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Engine construction failed
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    /// No live engine session is available
    #[error("Speech engine is not initialized")]
    NotInitialized,

    /// An engine call failed (after retries, or with a non-retryable kind)
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// Another request is already in flight
    #[error("A request is already in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

impl From<String> for HarnessError {
    fn from(s: String) -> Self {
        HarnessError::Other(s)
    }
}

impl From<&str> for HarnessError {
    fn from(s: &str) -> Self {
        HarnessError::Other(s.to_string())
    }
}

/// Broad classification of an engine failure
///
/// Only `Connection` failures are worth replacing the session for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The transport between the harness and the engine dropped
    Connection,
    /// Anything else: bad input, decoding, file system, unsupported operation
    Other,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErrorKind::Connection => write!(f, "connection"),
            EngineErrorKind::Other => write!(f, "engine"),
        }
    }
}

/// Error returned by an engine session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Other,
            message: message.into(),
        }
    }

    /// Whether a fresh session may succeed where this one failed
    pub fn is_connection(&self) -> bool {
        self.kind == EngineErrorKind::Connection
    }
}

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_kind() {
        assert!(EngineError::connection("socket closed").is_connection());
        assert!(!EngineError::other("bad voice").is_connection());
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::connection("socket closed");
        assert_eq!(err.to_string(), "connection error: socket closed");

        let wrapped: HarnessError = EngineError::other("bad voice").into();
        assert_eq!(wrapped.to_string(), "engine error: bad voice");
    }
}
