//! Errors returned by the document API.
//!
//! Every failure becomes an [`ErrorBody`] with an `error_id` that also
//! appears in the log line, so a client report can be matched to the server
//! side. Upstream authorization-service detail is logged, never returned.

use auth_openfga::FgaError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Messages per request field
pub type FieldErrors = HashMap<String, Vec<String>>;

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_id: String,
    pub error_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<FieldErrors>,
    },

    #[error("Unauthenticated: {message}")]
    Authentication { message: String },

    #[error("Forbidden: {message}")]
    Authorization { message: String },

    #[error("{resource_type} not found")]
    NotFound { resource_type: String },

    #[error("Authorization service failure: {0}")]
    AuthorizationService(#[from] FgaError),

    #[error("Internal failure: {message}")]
    Internal { message: String },

    #[error("Invalid configuration: {message}")]
    Configuration { message: String },
}

impl ApiError {
    /// Validation failure attributed to one request field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let field_errors = FieldErrors::from([(field.to_string(), vec![message.clone()])]);
        Self::Validation {
            message,
            field_errors: Some(field_errors),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// HTTP status and wire `error_type`
    fn descriptor(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Authentication { .. } => (StatusCode::UNAUTHORIZED, "authentication_error"),
            ApiError::Authorization { .. } => (StatusCode::FORBIDDEN, "authorization_error"),
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::AuthorizationService(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "authorization_service_error")
            }
            ApiError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.descriptor().0
    }

    pub fn error_type(&self) -> &'static str {
        self.descriptor().1
    }

    /// What the caller can do about it, when there is anything
    fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation { .. } => Some("Correct the listed fields and resend the request"),
            ApiError::Authentication { .. } => {
                Some("Send a valid, unexpired token as 'Authorization: Bearer <token>'")
            }
            ApiError::Authorization { .. } => Some("Ask the document owner to share it with you"),
            ApiError::NotFound { .. } => Some("Check the document id"),
            ApiError::AuthorizationService(_) => Some("Retry shortly; permissions could not be evaluated"),
            ApiError::Internal { .. } | ApiError::Configuration { .. } => None,
        }
    }

    /// Message safe to return to clients
    fn public_message(&self) -> String {
        match self {
            ApiError::AuthorizationService(_) => "Authorization service error".to_string(),
            ApiError::Internal { .. } | ApiError::Configuration { .. } => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.descriptor();
        let error_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            error!(%error_id, error_type, status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(%error_id, error_type, status = status.as_u16(), error = %self, "Request rejected");
        }

        let message = self.public_message();
        let suggestions = self.hint().map(|hint| vec![hint.to_string()]);
        let field_errors = match self {
            ApiError::Validation { field_errors, .. } => field_errors,
            _ => None,
        };

        let body = ErrorBody {
            error_id,
            error_type: error_type.to_string(),
            message,
            field_errors,
            timestamp: Utc::now(),
            suggestions,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
