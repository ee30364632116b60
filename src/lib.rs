//! # layerconf
//!
//! Layered YAML configuration with placeholder substitution and pluggable
//! secret engines.
//!
//! ## Resolution
//!
//! ```text
//! fragments → merge → normalize → register vault → placeholder/secret passes
//! ```
//!
//! - **Merge**: later fragments win; mappings merge key by key, sequences and
//!   scalars are replaced
//! - **Normalize**: numbers, booleans and nulls become canonical strings
//! - **Vault**: a `secrets.vault` section registers the `vault` engine
//! - **Passes**: `${path:default}` tokens are filled from the tree, then the
//!   environment, then the default; `encrypted:` references are decrypted
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use layerconf::{ConfigResolver, Result};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let resolver = ConfigResolver::from_process_env();
//!     let config = resolver.load_properties(&["app"], Path::new("/etc/app")).await?;
//!     println!("{:?}", config.get_str("server.port"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod observability;
pub mod profiles;
pub mod resolver;
pub mod tree;

// Re-export commonly used types
pub use crate::config::{LoggingConfig, ResolverSettings};
pub use errors::{ConfigError, Result};
pub use observability::init_logging;
pub use resolver::ConfigResolver;
pub use tree::{ConfigValue, Fragment, LeafPath, Value};

pub use layerconf_secrets as secrets;
