//! Secret references and the engines that resolve them.
//!
//! A configuration leaf whose text looks like
//! `encrypted:<engine>!<params>` (or `encryptedFile:<engine>!<params>`) is a
//! reference to a secret held somewhere else. This crate parses those
//! references, dispatches them to a named engine through an
//! [`EngineRegistry`], and returns the plaintext (or, for file references, the
//! path of a temporary file holding it).
//!
//! # Engines
//!
//! - **noop**: returns the parameter text verbatim, useful for tests
//! - **static**: fixed in-memory map keyed by `k`
//! - **secrets-manager**: cloud secrets manager (`r`, `s`, optional `k`)
//! - **gcs** / **s3**: object store blobs, optionally a YAML key inside them
//! - **k8s**: cluster secret objects (`n`, `k`, optional `ns`)
//! - **vault**: centralized secret server with token lifecycle management
//!
//! Cloud and cluster engines talk to the outside world through small client
//! traits so the embedding service can supply whichever SDK it already uses.
//!
//! # Example
//!
//! ```rust,ignore
//! use layerconf_secrets::{EngineRegistry, SecretReference};
//!
//! let registry = EngineRegistry::with_defaults();
//! let reference = SecretReference::detect("encrypted:noop!asdf1234")?.unwrap();
//! assert_eq!(registry.decrypt(&reference).await?, "asdf1234");
//! ```

pub mod backends;
pub mod env;
pub mod error;
pub mod materialize;
pub mod reference;
pub mod types;
pub mod vault;

pub use backends::{
    Decrypter, EngineFactory, EngineKind, EngineRegistry, KubernetesEngine, NoopEngine,
    ObjectStoreEngine, SecretsManagerEngine, StaticEngine,
};
pub use env::{Environment, ProcessEnvironment};
pub use error::{Result, SecretsError};
pub use reference::SecretReference;
pub use types::SecretString;
pub use vault::{AuthMethod, HttpVaultClient, VaultApi, VaultConfig, VaultEngine};
