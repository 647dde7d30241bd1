use auth_openfga::InMemoryAuthorizationClient;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use docs_server::{
    auth::{IdentityClaims, TokenService},
    config::{FgaBackend, JwtConfig, RunMode},
    create_app,
    models::{Document, DocumentPermissions, ShareEntry},
    AppConfig, DocsServer,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ISSUER: &str = "openfga-microservice";

struct TestApp {
    app: Router,
    tokens: TokenService,
    fga: Arc<InMemoryAuthorizationClient>,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig {
            port: 0,
            run_mode: RunMode::Debug,
            jwt: JwtConfig {
                secret: Secret::new("integration-secret".to_string()),
                issuer: ISSUER.to_string(),
            },
            backend: FgaBackend::Memory,
        };
        let fga = Arc::new(InMemoryAuthorizationClient::new());
        let tokens = TokenService::new(&config.jwt);
        let server = DocsServer::with_client(config, fga.clone());

        Self {
            app: create_app(server),
            tokens,
            fga,
        }
    }

    fn token(&self, user: &str) -> String {
        let claims = IdentityClaims::new(user, ISSUER, Duration::hours(1))
            .with_email(format!("{}@acme.test", user))
            .with_organization("acme");
        self.tokens.issue(&claims).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(&self, user: &str, title: &str) -> Document {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/documents",
                Some(user),
                Some(json!({ "title": title, "content": "quarterly numbers" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body).unwrap()
    }
}

#[tokio::test]
async fn test_health_reports_backend_state() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["authorization"], "healthy");

    app.fga.set_unavailable(true);
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["authorization"], "unhealthy");
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/documents", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_type"], "authentication_error");

    let request = Request::builder()
        .uri("/api/documents")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(app.fga.total_calls(), 0);
}

#[tokio::test]
async fn test_owner_shares_document_with_colleague() {
    let app = TestApp::new();
    let document = app.create("alice", "Budget").await;
    assert_eq!(document.owner_id, "alice");
    assert_eq!(document.organization_id, "acme");
    let uri = format!("/api/documents/{}", document.id);

    let (status, body) = app.send(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Budget");

    let (status, body) = app.send(Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_type"], "authorization_error");

    // only the owner may share
    let share_uri = format!("{}/share", uri);
    let (status, _) = app
        .send(
            Method::POST,
            &share_uri,
            Some("bob"),
            Some(json!({ "user_id": "bob", "relation": "editor" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::POST,
            &share_uri,
            Some("alice"),
            Some(json!({ "user_id": "bob", "relation": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("bob"));

    let (status, _) = app.send(Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);

    // viewers cannot edit
    let (status, _) = app
        .send(Method::PUT, &uri, Some("bob"), Some(json!({ "title": "Mine now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::GET, &format!("{}/permissions", uri), Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let permissions: DocumentPermissions = serde_json::from_value(body).unwrap();
    assert_eq!(
        permissions,
        DocumentPermissions {
            can_view: true,
            can_edit: false,
            can_delete: false
        }
    );

    let (status, body) = app
        .send(Method::GET, &format!("{}/shares", uri), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let shares: Vec<ShareEntry> = serde_json::from_value(body).unwrap();
    assert_eq!(
        shares,
        vec![ShareEntry {
            user: "user:bob".to_string(),
            relation: "viewer".to_string()
        }]
    );

    let (status, _) = app
        .send(
            Method::POST,
            &format!("{}/unshare", uri),
            Some("alice"),
            Some(json!({ "user_id": "bob", "relation": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_share_rejects_non_shareable_relation() {
    let app = TestApp::new();
    let document = app.create("alice", "Budget").await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/documents/{}/share", document.id),
            Some("alice"),
            Some(json!({ "user_id": "bob", "relation": "owner" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert!(body["field_errors"]["relation"].is_array());

    let (status, body) = app
        .send(Method::GET, "/api/documents/by-relation/member", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn test_update_list_and_delete() {
    let app = TestApp::new();
    let document = app.create("alice", "Budget").await;
    app.create("bob", "Private notes").await;
    let uri = format!("/api/documents/{}", document.id);

    let (status, body) = app
        .send(Method::PUT, &uri, Some("alice"), Some(json!({ "content": "revised" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Budget");
    assert_eq!(body["content"], "revised");

    let (status, body) = app.send(Method::GET, "/api/documents", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<Document> = serde_json::from_value(body).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, document.id);

    let (status, body) = app
        .send(Method::GET, "/api/documents/by-relation/owner", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = app.send(Method::DELETE, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    // the tuples went with the document, so the gate now denies
    let (status, _) = app.send(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/documents")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token("alice")))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.fga.tuple_count(), 0);
}
