use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::server::DocsServer;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: u64,
    pub checks: HashMap<String, String>,
}

/// Health check handler.
///
/// Reports 503 when the authorization service cannot be reached, since no
/// document request can be served without it.
pub async fn health_check(State(server): State<DocsServer>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = HashMap::new();

    let healthy = match server.fga.health_check().await {
        Ok(()) => {
            checks.insert("authorization".to_string(), "healthy".to_string());
            true
        }
        Err(err) => {
            warn!(error = %err, "Authorization service health check failed");
            checks.insert("authorization".to_string(), "unhealthy".to_string());
            false
        }
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.started_at.elapsed().as_secs(),
        checks,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
