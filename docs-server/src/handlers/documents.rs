use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ApiResult},
    middleware::RequestContext,
    models::*,
    server::DocsServer,
};

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(format!("Invalid request body: {}", rejection.body_text())))
}

/// POST /api/documents
pub async fn create_document(
    State(server): State<DocsServer>,
    ctx: RequestContext,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let request = json_body(payload)?;
    let document = server.documents.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/documents
pub async fn list_documents(
    State(server): State<DocsServer>,
    ctx: RequestContext,
) -> Json<Vec<Document>> {
    Json(server.documents.list(&ctx).await)
}

/// GET /api/documents/:id
pub async fn get_document(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    server.documents.get(&id).await.map(Json)
}

/// PUT /api/documents/:id
pub async fn update_document(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> ApiResult<Json<Document>> {
    let request = json_body(payload)?;
    server.documents.update(&id, request).await.map(Json)
}

/// DELETE /api/documents/:id
pub async fn delete_document(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    server.documents.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/documents/:id/share
pub async fn share_document(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
    payload: Result<Json<ShareDocumentRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let request = json_body(payload)?;
    server.documents.share(&id, request).await.map(Json)
}

/// POST /api/documents/:id/unshare
pub async fn unshare_document(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
    payload: Result<Json<ShareDocumentRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let request = json_body(payload)?;
    server.documents.unshare(&id, request).await.map(Json)
}

/// GET /api/documents/:id/shares
pub async fn list_shares(
    State(server): State<DocsServer>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ShareEntry>>> {
    server.documents.shares(&id).await.map(Json)
}

/// GET /api/documents/:id/permissions
pub async fn document_permissions(
    State(server): State<DocsServer>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentPermissions>> {
    server.documents.permissions(&ctx, &id).await.map(Json)
}

/// GET /api/documents/by-relation/:relation
pub async fn documents_by_relation(
    State(server): State<DocsServer>,
    ctx: RequestContext,
    Path(relation): Path<String>,
) -> ApiResult<Json<Vec<Document>>> {
    server.documents.by_relation(&ctx, &relation).await.map(Json)
}
