//! Minimal Vault HTTP API client.
//!
//! Only the two logical operations the engine needs: read a path and write a
//! login request. Response warnings are preserved because the KV v1 to v2
//! fallback depends on them.

use crate::error::{Result, SecretsError};
use crate::types::SecretString;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Failure kinds reported by a [`VaultApi`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultApiError {
    /// The token was rejected (HTTP 403).
    #[error("permission denied: {message}")]
    Forbidden { message: String },

    /// Any other non-success status.
    #[error("Vault returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never completed.
    #[error("request to Vault failed: {message}")]
    Transport { message: String },

    /// The body could not be parsed as a Vault response.
    #[error("unparsable Vault response: {message}")]
    MalformedResponse { message: String },
}

/// Authentication block of a login response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultAuth {
    pub client_token: SecretString,
}

/// The parts of a Vault response the engine looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultResponse {
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    #[serde(default)]
    pub auth: Option<VaultAuth>,
}

impl VaultResponse {
    /// True if any warning contains `needle`.
    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings.iter().flatten().any(|w| w.contains(needle))
    }

    fn is_empty(&self) -> bool {
        self.data.as_ref().map_or(true, |d| d.is_empty())
            && self.warnings.as_ref().map_or(true, |w| w.is_empty())
    }
}

/// Logical read/write against a Vault server.
///
/// `Ok(None)` means the path holds nothing.
#[async_trait]
pub trait VaultApi: Send + Sync + Debug {
    async fn read(
        &self,
        path: &str,
        token: Option<&SecretString>,
    ) -> std::result::Result<Option<VaultResponse>, VaultApiError>;

    async fn write(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: serde_json::Value,
    ) -> std::result::Result<Option<VaultResponse>, VaultApiError>;
}

/// [`VaultApi`] over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpVaultClient {
    client: Client,
    base_url: String,
    namespace: Option<String>,
}

impl HttpVaultClient {
    /// Create a client for `base_url` (e.g. `https://vault:8200`)
    pub fn new(base_url: &str, namespace: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SecretsError::config(format!("failed to build Vault HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn decorate(&self, request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
        let request = match token {
            Some(token) => request.header(TOKEN_HEADER, token.expose_secret()),
            None => request,
        };
        match &self.namespace {
            Some(ns) => request.header(NAMESPACE_HEADER, ns),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<Option<VaultResponse>, VaultApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| VaultApiError::Transport { message: e.to_string() })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VaultApiError::Transport { message: e.to_string() })?;
        trace!(status = status.as_u16(), bytes = body.len(), "Vault response received");

        if status == StatusCode::FORBIDDEN {
            return Err(VaultApiError::Forbidden { message: error_summary(&body) });
        }

        if status == StatusCode::NOT_FOUND {
            // KV v2 mounts answer v1-style reads with 404 plus a warning
            if body.trim().is_empty() {
                return Ok(None);
            }
            let parsed = parse_body(&body)?;
            return Ok(Some(parsed).filter(|r| !r.is_empty()));
        }

        if !status.is_success() {
            return Err(VaultApiError::Status {
                status: status.as_u16(),
                message: error_summary(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        parse_body(&body).map(Some)
    }
}

#[async_trait]
impl VaultApi for HttpVaultClient {
    async fn read(
        &self,
        path: &str,
        token: Option<&SecretString>,
    ) -> std::result::Result<Option<VaultResponse>, VaultApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        self.send(self.decorate(self.client.get(&url), token)).await
    }

    async fn write(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: serde_json::Value,
    ) -> std::result::Result<Option<VaultResponse>, VaultApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        self.send(self.decorate(self.client.post(&url), token).json(&body)).await
    }
}

fn parse_body(body: &str) -> std::result::Result<VaultResponse, VaultApiError> {
    serde_json::from_str(body).map_err(|e| VaultApiError::MalformedResponse { message: e.to_string() })
}

/// Vault error bodies look like `{"errors":["..."]}`.
fn error_summary(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => body.trim().chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = HttpVaultClient::new("http://vault:8200/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://vault:8200");
        assert_eq!(client.url("secret/app"), "http://vault:8200/v1/secret/app");
        assert_eq!(client.url("/auth/k8s/login"), "http://vault:8200/v1/auth/k8s/login");
    }

    #[test]
    fn test_error_summary() {
        assert_eq!(error_summary(r#"{"errors":["permission denied"]}"#), "permission denied");
        assert_eq!(error_summary(r#"{"errors":["a","b"]}"#), "a; b");
        assert_eq!(error_summary("  <html>oops</html> "), "<html>oops</html>");
    }

    #[test]
    fn test_response_warning_detection() {
        let response: VaultResponse = serde_json::from_str(
            r#"{"data":null,"warnings":["Invalid path for a versioned K/V secrets engine. See the API docs"],"auth":null}"#,
        )
        .unwrap();
        assert!(response.has_warning("Invalid path for a versioned K/V secrets engine"));
        assert!(!response.is_empty());

        let empty: VaultResponse = serde_json::from_str(r#"{"errors":[]}"#).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.has_warning("anything"));
    }

    #[test]
    fn test_login_response_token() {
        let response: VaultResponse =
            serde_json::from_str(r#"{"auth":{"client_token":"s.abc","policies":["default"]}}"#)
                .unwrap();
        assert_eq!(response.auth.unwrap().client_token.expose_secret(), "s.abc");
    }
}
