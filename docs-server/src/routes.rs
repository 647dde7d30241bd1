use auth_openfga::Relation;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{
    handlers::{documents, health},
    middleware::{authenticate, enforce, GuardPipeline},
    server::DocsServer,
};

/// Create health check routes
pub fn health_routes() -> Router<DocsServer> {
    Router::new().route("/health", get(health::health_check))
}

/// Document CRUD, gated by the relation implied by the HTTP method
fn crud_routes(pipeline: Arc<GuardPipeline>) -> Router<DocsServer> {
    Router::new()
        .route(
            "/api/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/api/documents/by-relation/:relation",
            get(documents::documents_by_relation),
        )
        .route(
            "/api/documents/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route_layer(from_fn_with_state(pipeline, enforce))
}

/// Share management, owner only
fn sharing_routes(pipeline: Arc<GuardPipeline>) -> Router<DocsServer> {
    Router::new()
        .route("/api/documents/:id/share", post(documents::share_document))
        .route("/api/documents/:id/unshare", post(documents::unshare_document))
        .route("/api/documents/:id/shares", get(documents::list_shares))
        .route_layer(from_fn_with_state(pipeline, enforce))
}

fn permission_routes(pipeline: Arc<GuardPipeline>) -> Router<DocsServer> {
    Router::new()
        .route(
            "/api/documents/:id/permissions",
            get(documents::document_permissions),
        )
        .route_layer(from_fn_with_state(pipeline, enforce))
}

/// Create document routes; every request is authenticated first
pub fn document_routes(server: &DocsServer) -> Router<DocsServer> {
    let fga = server.fga.clone();

    Router::new()
        .merge(crud_routes(Arc::new(GuardPipeline::by_method(fga.clone()))))
        .merge(sharing_routes(Arc::new(GuardPipeline::requiring(
            fga.clone(),
            Relation::Owner,
        ))))
        .merge(permission_routes(Arc::new(GuardPipeline::requiring(
            fga,
            Relation::CanView,
        ))))
        .layer(from_fn_with_state(server.tokens.clone(), authenticate))
}

/// Create all routes
pub fn create_routes(server: &DocsServer) -> Router<DocsServer> {
    Router::new()
        .merge(health_routes())
        .merge(document_routes(server))
}
