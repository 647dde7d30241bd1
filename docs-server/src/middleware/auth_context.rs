//! Authentication context extraction middleware
//!
//! [`authenticate`] verifies the bearer token, when one is sent, and stores the
//! caller's [`RequestContext`] in the request extensions. Handlers and the
//! permission pipeline read it from there.

use async_trait::async_trait;
use auth_openfga::Subject;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{IdentityClaims, TokenService};
use crate::error::ApiError;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub email: Option<String>,
    pub organization_id: Option<String>,
}

impl RequestContext {
    /// Create a new RequestContext (for testing)
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// The caller as an authorization subject (`user:<id>`)
    pub fn subject(&self) -> Subject {
        Subject::user(&self.user_id)
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization_id.as_deref().filter(|org| !org.is_empty())
    }
}

impl From<IdentityClaims> for RequestContext {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            organization_id: claims.organization_id,
        }
    }
}

/// Extract the bearer token from the Authorization header.
///
/// `Ok(None)` when the header is absent; an error when it is present but
/// not a usable bearer token.
fn extract_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_header = value
        .to_str()
        .map_err(|_| ApiError::authentication("Authorization header is not valid text"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>")
        })?
        .trim();

    if token.is_empty() {
        return Err(ApiError::authentication("Empty bearer token"));
    }
    Ok(Some(token.to_string()))
}

/// Verify the bearer token and attach the caller's context.
///
/// Requests without a token pass through unauthenticated; the permission
/// pipeline rejects them where identity is required.
pub async fn authenticate(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_token(request.headers()) {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };

    if let Some(token) = token {
        match tokens.verify(&token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.user_id, "Authenticated request");
                request.extensions_mut().insert(RequestContext::from(claims));
            }
            Err(err) => return err.into_response(),
        }
    }

    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::authentication("Missing authentication context"))
    }
}
