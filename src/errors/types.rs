//! # Error Types
//!
//! The single error type surfaced by configuration resolution.

use crate::tree::LeafPath;
use layerconf_secrets::SecretsError;

/// Custom result type for resolution operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors returned by [`crate::ConfigResolver`] and its helpers
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A secret reference at `path` could not be resolved
    #[error("Failed to resolve secret at '{path}': {source}")]
    Secret {
        path: String,
        #[source]
        source: SecretsError,
    },

    /// Placeholders were still present when the pass bound ran out
    #[error("Unresolved placeholders after {passes} passes: {}", .paths.join(", "))]
    UnresolvedPlaceholders { paths: Vec<String>, passes: usize },

    /// A fragment could not be turned into a tree
    #[error("Invalid configuration fragment: {message}")]
    Fragment { message: String },

    /// The `secrets.vault` section is unusable
    #[error("Vault configuration error: {message}")]
    VaultConfig { message: String },

    /// Settings validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl ConfigError {
    /// Wrap a secret error with the leaf it came from
    pub fn secret(path: &LeafPath, source: SecretsError) -> Self {
        Self::Secret { path: path.to_string(), source }
    }

    /// Create a fragment error
    pub fn fragment<S: Into<String>>(message: S) -> Self {
        Self::Fragment { message: message.into() }
    }

    /// Create a vault configuration error
    pub fn vault_config<S: Into<String>>(message: S) -> Self {
        Self::VaultConfig { message: message.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// The underlying secret error, if this is one
    pub fn secret_source(&self) -> Option<&SecretsError> {
        match self {
            Self::Secret { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                (field.to_string(), format!("{}: {}", field, messages.join(", ")))
            })
            .collect();
        fields.sort();

        let summary: Vec<&str> = fields.iter().map(|(_, message)| message.as_str()).collect();
        let message = format!("Validation failed: {}", summary.join("; "));
        match fields.as_slice() {
            [(field, _)] => Self::validation_field(message, field.clone()),
            _ => Self::validation(message),
        }
    }
}
