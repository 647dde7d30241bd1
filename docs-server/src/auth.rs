//! Identity tokens (HS256 JWT) issued to callers of the document API

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::ApiError;

// =============================================================================
// JWT TOKEN CLAIMS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Bare (`alice`) or typed (`user:alice`) user identifier
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Organization the caller acts for; optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Issuer
    pub iss: String,

    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,

    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
}

impl IdentityClaims {
    /// Claims valid for `ttl` from now. Expiry saturates at the latest
    /// representable instant.
    pub fn new(user_id: impl Into<String>, issuer: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            user_id: user_id.into(),
            email: None,
            organization_id: None,
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

// =============================================================================
// JWT SERVICE
// =============================================================================

/// Signs and verifies identity tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, claims: &IdentityClaims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature, issuer and expiry, and return the claims
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, ApiError> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ApiError::authentication(format!("Invalid token: {}", e)))?;

        if data.claims.user_id.trim().is_empty() {
            return Err(ApiError::authentication("Token carries no user_id"));
        }
        Ok(data.claims)
    }
}
