//! Permission pipeline
//!
//! Every gated route runs an ordered list of [`GuardStage`]s before the
//! handler. A stage either hands off to the next one or denies the request
//! with an [`ApiError`]; the first denial wins and later stages never run.
//!
//! Stages:
//! - [`RequireIdentity`]: the caller must be authenticated
//! - [`VerbRelation`]: the relation follows from the HTTP method
//! - [`FixedRelation`]: one relation for every method on the route

use async_trait::async_trait;
use auth_openfga::{AuthorizationClient, Object, Relation, DOCUMENT_TYPE};
use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::auth_context::RequestContext;
use crate::error::ApiError;

/// Path parameter naming the gated resource
pub const RESOURCE_ID_PARAM: &str = "id";

/// What a stage sees of the request
#[derive(Debug, Clone)]
pub struct GuardRequest {
    pub method: Method,
    pub resource_id: Option<String>,
    pub context: Option<RequestContext>,
}

#[derive(Debug)]
pub enum GuardOutcome {
    Allow,
    Deny(ApiError),
}

impl GuardOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }
}

#[async_trait]
pub trait GuardStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, request: &GuardRequest, fga: &dyn AuthorizationClient) -> GuardOutcome;
}

/// Relation required for a document operation by HTTP method
pub fn relation_for_method(method: &Method) -> Option<Relation> {
    match *method {
        Method::GET | Method::HEAD => Some(Relation::CanView),
        Method::PUT | Method::PATCH => Some(Relation::CanEdit),
        Method::DELETE => Some(Relation::CanDelete),
        _ => None,
    }
}

async fn authorize(
    fga: &dyn AuthorizationClient,
    context: Option<&RequestContext>,
    relation: Relation,
    object: Object,
) -> GuardOutcome {
    let Some(context) = context else {
        return GuardOutcome::Deny(ApiError::authentication("Authentication required"));
    };
    let subject = context.subject();

    match fga.check(&subject, relation, &object).await {
        Ok(true) => {
            debug!(%subject, %relation, %object, "Permission granted");
            GuardOutcome::Allow
        }
        Ok(false) => {
            warn!(%subject, %relation, %object, "Permission denied");
            GuardOutcome::Deny(ApiError::authorization(format!(
                "'{}' is not permitted on {}",
                relation, object
            )))
        }
        Err(err) => {
            error!(%subject, %relation, %object, error = %err, "Permission check failed");
            GuardOutcome::Deny(ApiError::from(err))
        }
    }
}

/// Denies unauthenticated requests without calling the authorization service
pub struct RequireIdentity;

#[async_trait]
impl GuardStage for RequireIdentity {
    fn name(&self) -> &'static str {
        "require_identity"
    }

    async fn evaluate(&self, request: &GuardRequest, _fga: &dyn AuthorizationClient) -> GuardOutcome {
        match request.context {
            Some(_) => GuardOutcome::Allow,
            None => GuardOutcome::Deny(ApiError::authentication("Authentication required")),
        }
    }
}

/// Checks the document relation implied by the HTTP method.
///
/// Requests without a resource id (collection routes) and methods outside
/// the verb table pass through unchecked.
pub struct VerbRelation;

#[async_trait]
impl GuardStage for VerbRelation {
    fn name(&self) -> &'static str {
        "verb_relation"
    }

    async fn evaluate(&self, request: &GuardRequest, fga: &dyn AuthorizationClient) -> GuardOutcome {
        let Some(id) = request.resource_id.as_deref() else {
            return GuardOutcome::Allow;
        };
        let Some(relation) = relation_for_method(&request.method) else {
            return GuardOutcome::Allow;
        };

        authorize(fga, request.context.as_ref(), relation, Object::document(id)).await
    }
}

/// Checks one fixed relation; a resource id is mandatory
pub struct FixedRelation {
    pub object_type: String,
    pub relation: Relation,
}

impl FixedRelation {
    pub fn new(object_type: impl Into<String>, relation: Relation) -> Self {
        Self {
            object_type: object_type.into(),
            relation,
        }
    }

    pub fn document(relation: Relation) -> Self {
        Self::new(DOCUMENT_TYPE, relation)
    }
}

#[async_trait]
impl GuardStage for FixedRelation {
    fn name(&self) -> &'static str {
        "fixed_relation"
    }

    async fn evaluate(&self, request: &GuardRequest, fga: &dyn AuthorizationClient) -> GuardOutcome {
        let Some(id) = request.resource_id.as_deref().filter(|id| !id.is_empty()) else {
            return GuardOutcome::Deny(ApiError::field(RESOURCE_ID_PARAM, "Resource id is required"));
        };

        let object = Object::new(&self.object_type, id);
        authorize(fga, request.context.as_ref(), self.relation, object).await
    }
}

/// Ordered guard stages sharing one authorization client
pub struct GuardPipeline {
    fga: Arc<dyn AuthorizationClient>,
    stages: Vec<Box<dyn GuardStage>>,
}

impl GuardPipeline {
    pub fn new(fga: Arc<dyn AuthorizationClient>) -> Self {
        Self {
            fga,
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: impl GuardStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Identity, then the relation implied by the HTTP method
    pub fn by_method(fga: Arc<dyn AuthorizationClient>) -> Self {
        Self::new(fga).with_stage(RequireIdentity).with_stage(VerbRelation)
    }

    /// Identity, then one fixed relation on the document
    pub fn requiring(fga: Arc<dyn AuthorizationClient>, relation: Relation) -> Self {
        Self::new(fga)
            .with_stage(RequireIdentity)
            .with_stage(FixedRelation::document(relation))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run stages in order until one denies
    pub async fn run(&self, request: &GuardRequest) -> GuardOutcome {
        for stage in &self.stages {
            if let GuardOutcome::Deny(err) = stage.evaluate(request, self.fga.as_ref()).await {
                debug!(stage = stage.name(), method = %request.method, "Request denied");
                return GuardOutcome::Deny(err);
            }
        }
        GuardOutcome::Allow
    }
}

/// Axum middleware running a [`GuardPipeline`] in front of a route
pub async fn enforce(
    State(pipeline): State<Arc<GuardPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let resource_id = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == RESOURCE_ID_PARAM)
                .map(|(_, value)| value.to_string())
        });

    let guard_request = GuardRequest {
        method: parts.method.clone(),
        resource_id,
        context: parts.extensions.get::<RequestContext>().cloned(),
    };

    match pipeline.run(&guard_request).await {
        GuardOutcome::Allow => next.run(Request::from_parts(parts, body)).await,
        GuardOutcome::Deny(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_openfga::{InMemoryAuthorizationClient, Subject, Tuple};
    use axum::http::StatusCode;

    fn request(method: Method, id: Option<&str>, user: Option<&str>) -> GuardRequest {
        GuardRequest {
            method,
            resource_id: id.map(str::to_string),
            context: user.map(RequestContext::new),
        }
    }

    fn status(outcome: GuardOutcome) -> Option<StatusCode> {
        match outcome {
            GuardOutcome::Allow => None,
            GuardOutcome::Deny(err) => Some(err.status_code()),
        }
    }

    async fn backend_with_owner() -> Arc<InMemoryAuthorizationClient> {
        let fga = Arc::new(InMemoryAuthorizationClient::new());
        fga.write_tuples(&[Tuple::new(
            Subject::user("alice"),
            Relation::Owner,
            Object::document("doc1"),
        )])
        .await
        .unwrap();
        fga
    }

    #[test]
    fn test_verb_table() {
        assert_eq!(relation_for_method(&Method::GET), Some(Relation::CanView));
        assert_eq!(relation_for_method(&Method::HEAD), Some(Relation::CanView));
        assert_eq!(relation_for_method(&Method::PUT), Some(Relation::CanEdit));
        assert_eq!(relation_for_method(&Method::PATCH), Some(Relation::CanEdit));
        assert_eq!(relation_for_method(&Method::DELETE), Some(Relation::CanDelete));
        assert_eq!(relation_for_method(&Method::POST), None);
    }

    #[tokio::test]
    async fn test_missing_identity_denied_without_service_call() {
        let fga = backend_with_owner().await;
        let before = fga.total_calls();
        let pipeline = GuardPipeline::by_method(fga.clone());

        let outcome = pipeline.run(&request(Method::GET, Some("doc1"), None)).await;
        assert_eq!(status(outcome), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(fga.total_calls(), before);
    }

    #[tokio::test]
    async fn test_collection_requests_pass_through() {
        let fga = backend_with_owner().await;
        let before = fga.total_calls();
        let pipeline = GuardPipeline::by_method(fga.clone());

        assert!(pipeline.run(&request(Method::GET, None, Some("bob"))).await.is_allow());
        assert!(pipeline.run(&request(Method::POST, None, Some("bob"))).await.is_allow());
        assert_eq!(fga.total_calls(), before);
    }

    #[tokio::test]
    async fn test_verb_relation_checks_once() {
        let fga = backend_with_owner().await;
        let pipeline = GuardPipeline::by_method(fga.clone());
        let before = fga.total_calls();

        assert!(pipeline.run(&request(Method::DELETE, Some("doc1"), Some("alice"))).await.is_allow());
        assert_eq!(
            status(pipeline.run(&request(Method::PUT, Some("doc1"), Some("bob"))).await),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(fga.total_calls(), before + 2);
    }

    #[tokio::test]
    async fn test_fixed_relation_requires_id() {
        let fga = backend_with_owner().await;
        let before = fga.total_calls();
        let pipeline = GuardPipeline::requiring(fga.clone(), Relation::Owner);

        assert_eq!(
            status(pipeline.run(&request(Method::POST, None, Some("alice"))).await),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(fga.total_calls(), before);

        assert!(pipeline.run(&request(Method::POST, Some("doc1"), Some("alice"))).await.is_allow());
        assert_eq!(
            status(pipeline.run(&request(Method::POST, Some("doc1"), Some("bob"))).await),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn test_service_failure_is_not_an_allow() {
        let fga = backend_with_owner().await;
        fga.fail_checks_on(Object::document("doc1"));
        let pipeline = GuardPipeline::by_method(fga.clone());

        assert_eq!(
            status(pipeline.run(&request(Method::GET, Some("doc1"), Some("alice"))).await),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn test_pipeline_order() {
        let fga = Arc::new(InMemoryAuthorizationClient::new());
        assert_eq!(
            GuardPipeline::by_method(fga.clone()).stage_names(),
            vec!["require_identity", "verb_relation"]
        );
        assert_eq!(
            GuardPipeline::requiring(fga, Relation::CanView).stage_names(),
            vec!["require_identity", "fixed_relation"]
        );
    }
}
