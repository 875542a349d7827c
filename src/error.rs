//! Error types for utc

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for utc operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to write artifact '{name}': {source}")]
    ArtifactError {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("{tool} failed: {message}")]
    ToolError { tool: String, message: String },
}

/// Result type alias for utc operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Closed set of failure kinds a single check can end with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed target
    InvalidRequest,
    /// Transport-level failure reaching the target or an external API
    NetworkError,
    /// The headless browser could not load the target
    NavigationError,
    /// Container runtime missing or not running
    RuntimeUnavailable,
    /// Run aborted by the caller's deadline or cancellation
    Cancelled,
    /// External API answered with a body that could not be understood
    InvalidResponse,
    /// The check panicked or its artifact could not be persisted
    Internal,
}

impl ErrorKind {
    /// Soft failures are reported as warnings and never fail a run
    pub fn is_soft(&self) -> bool {
        matches!(self, ErrorKind::RuntimeUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::NavigationError => "NavigationError",
            ErrorKind::RuntimeUnavailable => "RuntimeUnavailable",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{name}")
    }
}

/// Failure record attached to a check result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CheckError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CheckError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NavigationError, message)
    }

    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeUnavailable, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "run cancelled before the check finished")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<AuditError> for CheckError {
    fn from(err: AuditError) -> Self {
        let kind = match &err {
            AuditError::InvalidRequest(_) | AuditError::UrlError(_) => ErrorKind::InvalidRequest,
            AuditError::HttpError(_) => ErrorKind::NetworkError,
            AuditError::JsonError(_) => ErrorKind::InvalidResponse,
            _ => ErrorKind::Internal,
        };
        CheckError::new(kind, err.to_string())
    }
}
