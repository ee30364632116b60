//! Centralized secret server (HashiCorp Vault) engine.
//!
//! Covers config validation, the token lifecycle for the `TOKEN`,
//! `KUBERNETES` and `USERPASS` auth methods, and KV v1/v2 reads.

pub mod auth;
pub mod client;
pub mod config;
pub mod engine;

pub use auth::{TokenCache, TokenFetcher, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};
pub use client::{HttpVaultClient, VaultApi, VaultApiError, VaultAuth, VaultResponse};
pub use config::{AuthMethod, VaultConfig, VAULT_TOKEN_ENV};
pub use engine::{VaultDecrypter, VaultEngine, VaultOptions, VERSIONED_KV_WARNING};
