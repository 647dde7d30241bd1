//! OpenFGA authorization client for the document service
//!
//! This crate wraps the relationship-based authorization service that gates
//! document access:
//! - A typed relation tuple model (`user:alice owner document:42`)
//! - The [`AuthorizationClient`] trait the service depends on
//! - An HTTP implementation for the OpenFGA REST API, with read retries and
//!   API token or client-credentials authentication
//! - An in-memory implementation evaluating the document model locally,
//!   for development and tests
//!
//! # Core Concepts
//!
//! - **Object**: A protected resource (`document:<id>`, `organization:<id>`)
//! - **Subject**: Who holds the relation (`user:<id>`, `organization:<id>`)
//! - **Relation**: Stored (`owner`, `editor`, …) or derived (`can_view`, …)
//! - **Tuple**: "subject has relation to object"
//!
//! # Example
//!
//! ```rust
//! use auth_openfga::{AuthorizationClient, InMemoryAuthorizationClient, Object, Relation, Subject, Tuple};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = InMemoryAuthorizationClient::new();
//!
//! client
//!     .write_tuples(&[Tuple::new(
//!         Subject::user("alice"),
//!         Relation::Owner,
//!         Object::document("doc1"),
//!     )])
//!     .await?;
//!
//! let allowed = client
//!     .check(&Subject::user("alice"), Relation::CanEdit, &Object::document("doc1"))
//!     .await?;
//! assert!(allowed);
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod models;
pub mod openfga;
pub mod retry;
pub mod schema;

pub use client::AuthorizationClient;
pub use config::{CredentialSettings, FgaConfig};
pub use credentials::{ClientCredentials, Credentials};
pub use error::*;
pub use memory::InMemoryAuthorizationClient;
pub use models::*;
pub use openfga::OpenFgaClient;
pub use retry::RetryPolicy;
pub use schema::Schema;
