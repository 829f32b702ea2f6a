use std::env;

use url::Url;

use crate::errors::ClientError;

pub const ENDPOINT_VAR: &str = "TURNSTILE_ENDPOINT";
pub const API_KEY_VAR: &str = "TURNSTILE_API_KEY";
pub const IDENTITY_ENDPOINT_VAR: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_TOKEN_VAR: &str = "IDENTITY_TOKEN";

/// Bearer credential for the platform.
///
/// Resolved once at startup and passed explicitly into the clients; nothing
/// in this crate consults the environment after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Developer API key.
    ApiKey(String),
    /// Token minted by the host's managed identity facility and injected
    /// into the process environment. The identity provider itself is an
    /// external collaborator.
    ManagedIdentity(String),
}

impl Credential {
    /// Managed identity when the host advertises an identity endpoint,
    /// developer key otherwise.
    pub fn from_env() -> Result<Self, ClientError> {
        let has_identity = env::var(IDENTITY_ENDPOINT_VAR)
            .map(|value| !value.is_empty())
            .unwrap_or(false);
        if has_identity {
            let token = env::var(IDENTITY_TOKEN_VAR)
                .map_err(|_| ClientError::MissingConfig(IDENTITY_TOKEN_VAR))?;
            Ok(Credential::ManagedIdentity(token))
        } else {
            let key =
                env::var(API_KEY_VAR).map_err(|_| ClientError::MissingConfig(API_KEY_VAR))?;
            Ok(Credential::ApiKey(key))
        }
    }

    pub fn bearer(&self) -> &str {
        match self {
            Credential::ApiKey(key) => key,
            Credential::ManagedIdentity(token) => token,
        }
    }
}

/// Connection settings for one platform project.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub credential: Credential,
}

impl ClientConfig {
    pub fn new(endpoint: &str, credential: Credential) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            credential,
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let endpoint =
            env::var(ENDPOINT_VAR).map_err(|_| ClientError::MissingConfig(ENDPOINT_VAR))?;
        Self::new(&endpoint, Credential::from_env()?)
    }
}
