//! Document lifecycle and the relation tuples that follow it.
//!
//! Create writes the `owner` and `organization` tuples and rolls the document
//! back if that write fails. Delete removes the document first and only
//! logs a failed tuple delete, which can leave orphaned tuples behind.

use auth_openfga::{
    AuthorizationClient, CheckRequest, FgaError, Object, Relation, Schema, Subject, Tuple,
    TupleFilter, DOCUMENT_TYPE,
};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::RequestContext,
    models::*,
    store::DocumentStore,
};

const DOCUMENT: &str = "document";

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<DocumentStore>,
    fga: Arc<dyn AuthorizationClient>,
}

impl DocumentService {
    pub fn new(store: Arc<DocumentStore>, fga: Arc<dyn AuthorizationClient>) -> Self {
        Self { store, fga }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn creation_tuples(document: &Document) -> [Tuple; 2] {
        let object = Object::document(&document.id);
        [
            Tuple::new(Subject::user(&document.owner_id), Relation::Owner, object.clone()),
            Tuple::new(
                Subject::organization(&document.organization_id),
                Relation::Organization,
                object,
            ),
        ]
    }

    fn existing(&self, id: &str) -> ApiResult<Document> {
        self.store.get(id).ok_or_else(|| ApiError::not_found(DOCUMENT))
    }

    /// Create a document owned by the caller
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateDocumentRequest,
    ) -> ApiResult<Document> {
        if request.title.trim().is_empty() {
            return Err(ApiError::field("title", "title is required"));
        }
        if request.content.trim().is_empty() {
            return Err(ApiError::field("content", "content is required"));
        }

        let organization = request
            .organization_id
            .as_deref()
            .filter(|org| !org.trim().is_empty())
            .or_else(|| ctx.organization())
            .ok_or_else(|| {
                ApiError::field(
                    "organization_id",
                    "organization_id is required when the token carries no organization",
                )
            })?;

        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            title: request.title,
            content: request.content,
            organization_id: Subject::organization(organization).id,
            owner_id: ctx.subject().id,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(document.clone());

        if let Err(err) = self.fga.write_tuples(&Self::creation_tuples(&document)).await {
            self.store.remove(&document.id);
            error!(
                document_id = %document.id,
                owner_id = %document.owner_id,
                error = %err,
                "Failed to write document tuples; creation rolled back"
            );
            return Err(err.into());
        }

        info!(
            document_id = %document.id,
            owner_id = %document.owner_id,
            organization_id = %document.organization_id,
            "Document created"
        );
        Ok(document)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Document> {
        self.existing(id)
    }

    /// Overwrite non-empty fields; `updated_at` always advances
    pub async fn update(&self, id: &str, request: UpdateDocumentRequest) -> ApiResult<Document> {
        let title = request.title.filter(|t| !t.is_empty());
        let content = request.content.filter(|c| !c.is_empty());

        self.store
            .update(id, |document| {
                if let Some(title) = title {
                    document.title = title;
                }
                if let Some(content) = content {
                    document.content = content;
                }
                let next_tick = document
                    .updated_at
                    .checked_add_signed(Duration::microseconds(1))
                    .unwrap_or(document.updated_at);
                document.updated_at = Utc::now().max(next_tick);
            })
            .ok_or_else(|| ApiError::not_found(DOCUMENT))
    }

    /// Remove the document, then its tuples on a best-effort basis
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let document = self.store.remove(id).ok_or_else(|| ApiError::not_found(DOCUMENT))?;

        if let Err(err) = self.fga.delete_tuples(&Self::creation_tuples(&document)).await {
            warn!(
                document_id = %document.id,
                owner_id = %document.owner_id,
                organization_id = %document.organization_id,
                inconsistency = "orphaned_tuples",
                error = %err,
                "Document deleted but its tuples could not be removed"
            );
        }

        info!(document_id = %document.id, "Document deleted");
        Ok(())
    }

    /// Documents the caller can view, oldest first.
    ///
    /// A failed check hides only that document.
    pub async fn list(&self, ctx: &RequestContext) -> Vec<Document> {
        let subject = ctx.subject();
        let mut visible = Vec::new();

        for document in self.store.list() {
            let object = Object::document(&document.id);
            match self.fga.check(&subject, Relation::CanView, &object).await {
                Ok(true) => visible.push(document),
                Ok(false) => {}
                Err(err) => {
                    error!(
                        %subject,
                        document_id = %document.id,
                        error = %err,
                        "Permission check failed; document excluded from listing"
                    );
                }
            }
        }

        visible
    }

    /// Grant `viewer` or `editor` on a document
    pub async fn share(&self, id: &str, request: ShareDocumentRequest) -> ApiResult<MessageResponse> {
        let tuple = self.share_tuple(id, &request)?;

        self.fga.write_tuples(&[tuple.clone()]).await.map_err(|err| {
            error!(%tuple, error = %err, "Failed to share document");
            ApiError::from(err)
        })?;

        info!(%tuple, "Document shared");
        Ok(MessageResponse::new(format!(
            "Document shared with {} as {}",
            tuple.subject.id, tuple.relation
        )))
    }

    /// Revoke a previously shared relation
    pub async fn unshare(&self, id: &str, request: ShareDocumentRequest) -> ApiResult<MessageResponse> {
        let tuple = self.share_tuple(id, &request)?;

        self.fga.delete_tuples(&[tuple.clone()]).await.map_err(|err| {
            error!(%tuple, error = %err, "Failed to revoke document share");
            ApiError::from(err)
        })?;

        info!(%tuple, "Document share revoked");
        Ok(MessageResponse::new(format!(
            "Revoked {} access for {}",
            tuple.relation, tuple.subject.id
        )))
    }

    /// Validate a share request: relation, then user, then existence
    fn share_tuple(&self, id: &str, request: &ShareDocumentRequest) -> ApiResult<Tuple> {
        let relation = Relation::parse_shareable(request.relation.trim())
            .map_err(|err| ApiError::field("relation", err.to_string()))?;

        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(ApiError::field("user_id", "user_id is required"));
        }

        self.existing(id)?;

        Ok(Tuple::new(Subject::user(user_id), relation, Object::document(id)))
    }

    /// The caller's effective permissions on a document
    pub async fn permissions(&self, ctx: &RequestContext, id: &str) -> ApiResult<DocumentPermissions> {
        self.existing(id)?;

        let subject = ctx.subject();
        let object = Object::document(id);
        let requests: Vec<CheckRequest> = [Relation::CanView, Relation::CanEdit, Relation::CanDelete]
            .into_iter()
            .map(|relation| CheckRequest::new(subject.clone(), relation, object.clone()))
            .collect();

        let results = self.fga.batch_check(&requests).await?;
        match results.as_slice() {
            [can_view, can_edit, can_delete] => Ok(DocumentPermissions {
                can_view: *can_view,
                can_edit: *can_edit,
                can_delete: *can_delete,
            }),
            _ => Err(ApiError::internal(format!(
                "expected 3 check results, got {}",
                results.len()
            ))),
        }
    }

    /// Users holding a shareable relation directly on the document
    pub async fn shares(&self, id: &str) -> ApiResult<Vec<ShareEntry>> {
        self.existing(id)?;

        let tuples = self
            .fga
            .read_tuples(&TupleFilter::for_object(Object::document(id)))
            .await?;

        Ok(tuples
            .into_iter()
            .filter(|tuple| tuple.relation.is_shareable())
            .map(|tuple| ShareEntry {
                user: tuple.subject.to_string(),
                relation: tuple.relation.to_string(),
            })
            .collect())
    }

    /// Stored documents on which the caller holds `relation`
    pub async fn by_relation(&self, ctx: &RequestContext, relation: &str) -> ApiResult<Vec<Document>> {
        let relation: Relation = relation
            .parse()
            .map_err(|err: FgaError| ApiError::field("relation", err.to_string()))?;
        if Schema::document_model().relation(DOCUMENT_TYPE, relation).is_none() {
            return Err(ApiError::field(
                "relation",
                format!("relation '{}' is not defined on documents", relation),
            ));
        }

        let objects = self
            .fga
            .list_objects(&ctx.subject(), relation, DOCUMENT_TYPE)
            .await?;
        let ids: HashSet<String> = objects.into_iter().map(|object| object.id).collect();

        Ok(self
            .store
            .list()
            .into_iter()
            .filter(|document| ids.contains(&document.id))
            .collect())
    }
}
