//! Credentials for reaching the OpenFGA API.
//!
//! A static API token is sent as-is. Client credentials are exchanged for an
//! access token at the configured issuer and cached until shortly before
//! they expire.

use crate::error::{FgaError, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret, Scope,
    TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, Secret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Tokens are refreshed this long before their reported expiry
const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Lifetime assumed when the issuer does not report one
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 300;

#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    ApiToken(SecretString),
    ClientCredentials(ClientCredentials),
}

#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub scopes: Vec<String>,
    pub token_issuer: String,
    pub audience: Option<String>,
}

impl ClientCredentials {
    /// Full token endpoint URL for the issuer.
    ///
    /// A bare host gets `https://`; an issuer without a path gets `/oauth/token`.
    pub fn token_url(&self) -> String {
        let issuer = self.token_issuer.trim_end_matches('/');
        let with_scheme = if issuer.starts_with("http://") || issuer.starts_with("https://") {
            issuer.to_string()
        } else {
            format!("https://{}", issuer)
        };

        let has_path = with_scheme
            .splitn(4, '/')
            .nth(3)
            .is_some_and(|path| !path.is_empty());
        if has_path {
            with_scheme
        } else {
            format!("{}/oauth/token", with_scheme)
        }
    }
}

struct CachedToken {
    value: SecretString,
    refresh_at: DateTime<Utc>,
}

/// Resolves the `Authorization` header value for outbound requests
pub struct TokenProvider {
    credentials: Credentials,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: RwLock::new(None),
        }
    }

    /// Bearer token to send, if any
    pub async fn bearer(&self) -> Result<Option<SecretString>> {
        match &self.credentials {
            Credentials::None => Ok(None),
            Credentials::ApiToken(token) => Ok(Some(token.clone())),
            Credentials::ClientCredentials(client) => self.exchange(client).await.map(Some),
        }
    }

    async fn exchange(&self, client: &ClientCredentials) -> Result<SecretString> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if Utc::now() < token.refresh_at {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token_url = client.token_url();
        debug!(token_url = %token_url, client_id = %client.client_id, "Requesting access token");

        let oauth_client = BasicClient::new(
            ClientId::new(client.client_id.clone()),
            Some(ClientSecret::new(client.client_secret.expose_secret().clone())),
            AuthUrl::new(token_url.clone())
                .map_err(|e| FgaError::Credentials(format!("invalid token issuer: {}", e)))?,
            Some(
                TokenUrl::new(token_url)
                    .map_err(|e| FgaError::Credentials(format!("invalid token issuer: {}", e)))?,
            ),
        );

        let mut request = oauth_client.exchange_client_credentials();
        for scope in &client.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        if let Some(audience) = &client.audience {
            request = request.add_extra_param("audience", audience.clone());
        }

        let response = request
            .request_async(async_http_client)
            .await
            .map_err(|e| FgaError::Credentials(format!("token exchange failed: {}", e)))?;

        let lifetime = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECONDS));
        let refresh_at = Utc::now() + lifetime - Duration::seconds(EXPIRY_MARGIN_SECONDS);

        let value: SecretString = Secret::new(response.access_token().secret().clone());
        info!(expires_in_seconds = lifetime.num_seconds(), "Obtained OpenFGA access token");

        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at,
        });
        Ok(value)
    }
}
