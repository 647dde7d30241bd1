//! Document service - HTTP API over in-memory documents
//!
//! Every access decision is delegated to an OpenFGA store. Creating a document
//! writes `owner` and `organization` tuples, sharing writes `viewer`/`editor`
//! tuples, and each gated request performs one relationship check before the
//! handler runs.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::*;
pub use server::DocsServer;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: DocsServer) -> Router {
    routes::create_routes(&server)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer())
                .layer(from_fn(middleware::request_timing_middleware)),
        )
        .with_state(server)
}
