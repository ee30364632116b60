//! Error types for secret resolution.

use thiserror::Error;

/// Result type for secret operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while parsing or resolving a secret reference.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The reference or its parameter list is malformed.
    #[error("Invalid secret reference: {reason}")]
    Format { reason: String },

    /// No engine is registered under the requested name.
    #[error("No secret engine registered for '{engine}'")]
    UnknownEngine { engine: String },

    /// Engine configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Obtaining credentials for the backend failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The backend rejected the credentials presented (HTTP 403).
    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    /// The backend could not be reached or answered with something unreadable.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The secret exists but does not contain the requested key.
    #[error("Key '{key}' not found in {location} (available keys: {})", .available.join(", "))]
    KeyNotFound { location: String, key: String, available: Vec<String> },

    /// The secret itself does not exist.
    #[error("Secret not found: {location}")]
    NotFound { location: String },

    /// The secret payload did not have the expected shape.
    #[error("Malformed secret payload: {reason}")]
    MalformedPayload { reason: String },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SecretsError {
    /// Create a format error.
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format { reason: reason.into() }
    }

    /// Create an unknown engine error.
    pub fn unknown_engine(engine: impl Into<String>) -> Self {
        Self::UnknownEngine { engine: engine.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create a key not found error. Available keys are sorted for stable output.
    pub fn key_not_found(
        location: impl Into<String>,
        key: impl Into<String>,
        mut available: Vec<String>,
    ) -> Self {
        available.sort();
        Self::KeyNotFound { location: location.into(), key: key.into(), available }
    }

    /// Create a not found error.
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound { location: location.into() }
    }

    /// Create a malformed payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload { reason: reason.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// True when the backend refused the presented credentials.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// True for errors that retrying the same request cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Format { .. }
                | Self::UnknownEngine { .. }
                | Self::Config { .. }
                | Self::KeyNotFound { .. }
                | Self::NotFound { .. }
                | Self::MalformedPayload { .. }
        )
    }
}
