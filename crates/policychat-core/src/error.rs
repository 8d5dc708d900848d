//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// A failed chat request. Every kind is reconciled the same way; the kind
/// only feeds logging.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct SendFailure {
    pub kind: SendFailureKind,
    pub message: String,
}

impl SendFailure {
    pub fn new(kind: SendFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SendFailureKind::Transport, message)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(SendFailureKind::Status, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SendFailureKind::Malformed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SendFailureKind::Timeout, message)
    }
}

impl From<reqwest::Error> for SendFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_decode() {
            Self::malformed(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailureKind {
    /// Backend unreachable or connection dropped
    Transport,
    /// Non-2xx response
    Status,
    /// Body is not JSON or lacks a string `response` field
    Malformed,
    /// Configured request timeout elapsed
    Timeout,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
