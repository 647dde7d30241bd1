use crate::{
    credentials::{ClientCredentials, Credentials},
    error::{FgaError, Result},
    retry::RetryPolicy,
};
use secrecy::SecretString;
use std::time::Duration;

/// Connection settings for an OpenFGA store
#[derive(Debug, Clone)]
pub struct FgaConfig {
    pub api_url: String,
    pub store_id: String,
    pub model_id: Option<String>,
    pub credentials: Credentials,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

/// Raw credential settings as they arrive from the environment
#[derive(Debug, Clone, Default)]
pub struct CredentialSettings {
    pub api_token: Option<SecretString>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub scopes: Option<String>,
    pub token_issuer: Option<String>,
    pub audience: Option<String>,
}

impl CredentialSettings {
    /// Resolve to exactly one credential method.
    ///
    /// An API token and client credentials cannot both be set, and client
    /// credentials need an id, a secret and a token issuer.
    pub fn resolve(self) -> Result<Credentials> {
        let client_configured = self.client_id.is_some() || self.client_secret.is_some();

        match (self.api_token, client_configured) {
            (Some(_), true) => Err(FgaError::Configuration(
                "FGA_API_TOKEN and FGA_CLIENT_ID/FGA_CLIENT_SECRET are mutually exclusive"
                    .to_string(),
            )),
            (Some(token), false) => Ok(Credentials::ApiToken(token)),
            (None, false) => Ok(Credentials::None),
            (None, true) => {
                let client_id = self.client_id.ok_or_else(|| {
                    FgaError::Configuration("FGA_CLIENT_ID is required with FGA_CLIENT_SECRET".to_string())
                })?;
                let client_secret = self.client_secret.ok_or_else(|| {
                    FgaError::Configuration("FGA_CLIENT_SECRET is required with FGA_CLIENT_ID".to_string())
                })?;
                let token_issuer = self.token_issuer.filter(|s| !s.is_empty()).ok_or_else(|| {
                    FgaError::Configuration(
                        "FGA_API_TOKEN_ISSUER is required for client credentials".to_string(),
                    )
                })?;
                let scopes = self
                    .scopes
                    .unwrap_or_default()
                    .split([' ', ','])
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();

                Ok(Credentials::ClientCredentials(ClientCredentials {
                    client_id,
                    client_secret,
                    scopes,
                    token_issuer,
                    audience: self.audience.filter(|s| !s.is_empty()),
                }))
            }
        }
    }
}

impl FgaConfig {
    pub fn new(api_url: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            store_id: store_id.into(),
            model_id: None,
            credentials: Credentials::None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(FgaError::Configuration("FGA_API_URL is required".to_string()));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(FgaError::Configuration(format!(
                "FGA_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.store_id.trim().is_empty() {
            return Err(FgaError::Configuration("FGA_STORE_ID is required".to_string()));
        }
        Ok(())
    }
}
