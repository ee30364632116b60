//! Decrypter and engine factory traits
//!
//! Defines the core interface for pluggable secret engines.

use crate::error::{Result, SecretsError};
use crate::materialize::write_temp_file;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Names of the engines shipped with this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Returns the parameter text verbatim
    Noop,
    /// Fixed in-memory key/value map
    Static,
    /// Cloud secrets manager
    SecretsManager,
    /// Google Cloud Storage object
    Gcs,
    /// Amazon S3 object
    S3,
    /// Kubernetes secret object
    Kubernetes,
    /// Centralized secret server
    Vault,
}

impl EngineKind {
    /// Name used after the `encrypted:` prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Static => "static",
            Self::SecretsManager => "secrets-manager",
            Self::Gcs => "gcs",
            Self::S3 => "s3",
            Self::Kubernetes => "k8s",
            Self::Vault => "vault",
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "noop" => Ok(Self::Noop),
            "static" => Ok(Self::Static),
            "secrets-manager" => Ok(Self::SecretsManager),
            "gcs" => Ok(Self::Gcs),
            "s3" => Ok(Self::S3),
            "k8s" => Ok(Self::Kubernetes),
            "vault" => Ok(Self::Vault),
            _ => Err(format!("Unknown secret engine: {}", s)),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secret reference bound to its engine, ready to fetch.
///
/// Implementations must be Send + Sync for use in async contexts.
#[async_trait]
pub trait Decrypter: Send + Sync + fmt::Debug {
    /// Fetch the raw secret material from the backend.
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Whether the reference asked for file materialization.
    fn is_file(&self) -> bool;

    /// Resolve the reference to the string that replaces it in the tree.
    ///
    /// For value references this is the secret itself and must be UTF-8.
    /// For file references the bytes are written to a new temporary file and
    /// its path is returned.
    async fn decrypt(&self) -> Result<String> {
        let material = self.fetch().await?;
        if self.is_file() {
            let path = write_temp_file(&material)?;
            return Ok(path.to_string_lossy().into_owned());
        }
        String::from_utf8(material)
            .map_err(|_| SecretsError::malformed("secret value is not valid UTF-8"))
    }
}

/// Builds a [`Decrypter`] from a reference's file flag and raw parameter text.
///
/// Building validates parameters only and never touches the network.
pub trait EngineFactory: Send + Sync {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>>;
}

impl<F> EngineFactory for F
where
    F: Fn(bool, &str) -> Result<Box<dyn Decrypter>> + Send + Sync,
{
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        self(is_file, raw_params)
    }
}
