//! Service configuration, read from the process environment.
//!
//! A `.env` file in the working directory is loaded first when present.

use auth_openfga::{CredentialSettings, FgaConfig, RetryPolicy};
use config::{Config, Environment, Map};
use secrecy::{Secret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Human-readable logs
    Debug,
    /// JSON logs
    Release,
}

/// Identity token verification settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub enum FgaBackend {
    /// Local evaluator, for development only
    Memory,
    OpenFga(FgaConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub run_mode: RunMode,
    pub jwt: JwtConfig,
    pub backend: FgaBackend,
}

/// Flat view of the environment variables this service reads
#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default = "default_port")]
    server_port: u16,
    #[serde(default)]
    run_mode: Option<String>,
    #[serde(default)]
    fga_backend: Option<String>,
    #[serde(default)]
    fga_api_url: Option<String>,
    #[serde(default)]
    fga_store_id: Option<String>,
    #[serde(default)]
    fga_model_id: Option<String>,
    #[serde(default)]
    fga_api_token: Option<String>,
    #[serde(default)]
    fga_client_id: Option<String>,
    #[serde(default)]
    fga_client_secret: Option<String>,
    #[serde(default)]
    fga_api_scopes: Option<String>,
    #[serde(default)]
    fga_api_token_issuer: Option<String>,
    #[serde(default)]
    fga_api_audience: Option<String>,
    #[serde(default = "default_max_retries")]
    fga_max_retries: u32,
    #[serde(default = "default_retry_min_wait")]
    fga_retry_min_wait_seconds: u64,
    #[serde(default = "default_request_timeout")]
    fga_request_timeout_seconds: u64,
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    jwt_issuer: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_min_wait() -> u64 {
    1
}

fn default_request_timeout() -> u64 {
    10
}

pub const DEFAULT_JWT_ISSUER: &str = "openfga-microservice";

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load from `.env` and the process environment
    pub fn from_env() -> Result<Self, ApiError> {
        // a missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::load(None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_map(vars: Map<String, String>) -> Result<Self, ApiError> {
        Self::load(Some(vars))
    }

    fn load(source: Option<Map<String, String>>) -> Result<Self, ApiError> {
        let settings: Settings = Config::builder()
            .add_source(Environment::default().source(source))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| ApiError::configuration(e.to_string()))?;

        settings.try_into()
    }
}

impl TryFrom<Settings> for AppConfig {
    type Error = ApiError;

    fn try_from(settings: Settings) -> Result<Self, Self::Error> {
        let run_mode = match non_empty(settings.run_mode).as_deref() {
            None | Some("debug") => RunMode::Debug,
            Some("release") => RunMode::Release,
            Some(other) => {
                return Err(ApiError::configuration(format!(
                    "RUN_MODE must be 'debug' or 'release', got '{}'",
                    other
                )))
            }
        };

        let secret = non_empty(settings.jwt_secret)
            .ok_or_else(|| ApiError::configuration("JWT_SECRET is required"))?;
        let jwt = JwtConfig {
            secret: Secret::new(secret),
            issuer: non_empty(settings.jwt_issuer).unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()),
        };

        let backend = match non_empty(settings.fga_backend).as_deref() {
            Some("memory") => FgaBackend::Memory,
            None | Some("openfga") => {
                let credentials = CredentialSettings {
                    api_token: non_empty(settings.fga_api_token).map(Secret::new),
                    client_id: non_empty(settings.fga_client_id),
                    client_secret: non_empty(settings.fga_client_secret).map(Secret::new),
                    scopes: non_empty(settings.fga_api_scopes),
                    token_issuer: non_empty(settings.fga_api_token_issuer),
                    audience: non_empty(settings.fga_api_audience),
                }
                .resolve()
                .map_err(|e| ApiError::configuration(e.to_string()))?;

                let fga = FgaConfig {
                    api_url: non_empty(settings.fga_api_url)
                        .ok_or_else(|| ApiError::configuration("FGA_API_URL is required"))?,
                    store_id: non_empty(settings.fga_store_id)
                        .ok_or_else(|| ApiError::configuration("FGA_STORE_ID is required"))?,
                    model_id: non_empty(settings.fga_model_id),
                    credentials,
                    retry: RetryPolicy {
                        max_retries: settings.fga_max_retries,
                        min_wait: Duration::from_secs(settings.fga_retry_min_wait_seconds),
                    },
                    request_timeout: Duration::from_secs(settings.fga_request_timeout_seconds),
                };
                fga.validate().map_err(|e| ApiError::configuration(e.to_string()))?;
                FgaBackend::OpenFga(fga)
            }
            Some(other) => {
                return Err(ApiError::configuration(format!(
                    "FGA_BACKEND must be 'openfga' or 'memory', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            port: settings.server_port,
            run_mode,
            jwt,
            backend,
        })
    }
}
