use auth_openfga::{AuthorizationClient, InMemoryAuthorizationClient, OpenFgaClient};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    auth::TokenService,
    config::{AppConfig, FgaBackend},
    error::ApiError,
    services::documents::DocumentService,
    store::DocumentStore,
};

/// Shared application state
#[derive(Clone)]
pub struct DocsServer {
    /// Authorization service client
    pub fga: Arc<dyn AuthorizationClient>,
    pub tokens: TokenService,
    pub documents: DocumentService,
    pub started_at: Instant,
}

impl DocsServer {
    /// Build the server state, connecting to the configured authorization backend
    pub fn new(config: AppConfig) -> Result<Self, ApiError> {
        let fga: Arc<dyn AuthorizationClient> = match &config.backend {
            FgaBackend::OpenFga(fga_config) => {
                info!(
                    api_url = %fga_config.api_url,
                    store_id = %fga_config.store_id,
                    model_id = fga_config.model_id.as_deref().unwrap_or("latest"),
                    "Using OpenFGA authorization backend"
                );
                let client = OpenFgaClient::new(fga_config.clone())
                    .map_err(|e| ApiError::configuration(e.to_string()))?;
                Arc::new(client)
            }
            FgaBackend::Memory => {
                warn!("Using in-memory authorization backend; not for production use");
                Arc::new(InMemoryAuthorizationClient::new())
            }
        };

        Ok(Self::with_client(config, fga))
    }

    /// Build the server state around an existing authorization client
    pub fn with_client(config: AppConfig, fga: Arc<dyn AuthorizationClient>) -> Self {
        let tokens = TokenService::new(&config.jwt);
        let documents = DocumentService::new(Arc::new(DocumentStore::new()), fga.clone());

        Self {
            fga,
            tokens,
            documents,
            started_at: Instant::now(),
        }
    }
}
