//! Error types for Vigil.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Scheduling errors
    #[error("Trigger failed: {0}")]
    TriggerFailure(String),

    #[error("Unsupported compose: {0}")]
    UnsupportedCompose(String),

    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    #[error("Release location mismatch: requested {requested}, found {found}")]
    UrlMismatch { requested: String, found: String },

    // Rule table errors
    #[error("Configuration gap: {0}")]
    ConfigurationGap(String),

    #[error("Invalid rule tables: {0}")]
    InvalidRules(String),

    // Reporting errors
    #[error("Reporting to {target} failed after {attempts} attempts: {message}")]
    ReportingFailed {
        target: String,
        attempts: u32,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // Infrastructure errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
