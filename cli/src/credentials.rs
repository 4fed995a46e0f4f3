//! Credentials: the service endpoint and the shared secret used for signing.
//!
//! [`CredentialProvider`] is the seam to wherever credentials live. The CLI uses
//! [`EnvCredentialProvider`], which reads the process environment after `config::load_and_apply`
//! has layered `.env` and the XDG config file into it.

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::error::CredentialError;

pub const ENDPOINT_ENV: &str = "BEACON_ENDPOINT";
pub const API_TOKEN_ENV: &str = "BEACON_API_TOKEN";

/// API token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: Url,
    pub secret: SecretToken,
}

impl Credentials {
    /// Parses and checks both values: the endpoint must be an absolute http(s) URL with a host,
    /// and the token must not be empty.
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, CredentialError> {
        let endpoint = endpoint.trim();
        let invalid = |reason: String| CredentialError::InvalidEndpoint {
            value: endpoint.to_string(),
            reason,
        };
        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        let secret = SecretToken::new(token);
        if secret.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        Ok(Self { endpoint: url, secret })
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches credentials once per invocation.
    async fn credentials(&self) -> Result<Credentials, CredentialError>;
}

/// Reads `BEACON_ENDPOINT` and `BEACON_API_TOKEN` (or custom keys) from the environment.
#[derive(Clone, Debug)]
pub struct EnvCredentialProvider {
    endpoint_key: String,
    token_key: String,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::with_keys(ENDPOINT_ENV, API_TOKEN_ENV)
    }
}

impl EnvCredentialProvider {
    pub fn with_keys(endpoint_key: impl Into<String>, token_key: impl Into<String>) -> Self {
        Self {
            endpoint_key: endpoint_key.into(),
            token_key: token_key.into(),
        }
    }

    fn read(key: &str) -> Result<String, CredentialError> {
        match std::env::var(key) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(CredentialError::Missing(key.to_string())),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        let endpoint = Self::read(&self.endpoint_key)?;
        let token = Self::read(&self.token_key)?;
        Credentials::new(&endpoint, token)
    }
}

/// Fixed credentials, e.g. for embedding the client in another tool.
#[async_trait]
impl CredentialProvider for Credentials {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(self.clone())
    }
}
