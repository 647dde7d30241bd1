//! Document service behaviour against the in-memory authorization backend
//!
//! Covers tuple bookkeeping on create/delete, rollback, validation before any
//! authorization call, and per-document filtering on list.

use auth_openfga::*;
use docs_server::{
    middleware::RequestContext,
    models::*,
    services::DocumentService,
    store::DocumentStore,
    ApiError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (DocumentService, Arc<InMemoryAuthorizationClient>) {
    let fga = Arc::new(InMemoryAuthorizationClient::new());
    let service = DocumentService::new(Arc::new(DocumentStore::new()), fga.clone());
    (service, fga)
}

fn alice() -> RequestContext {
    RequestContext::new("alice").with_organization("acme")
}

fn bob() -> RequestContext {
    RequestContext::new("bob").with_organization("acme")
}

fn new_document(title: &str) -> CreateDocumentRequest {
    CreateDocumentRequest {
        title: title.to_string(),
        content: format!("{} body", title),
        organization_id: None,
    }
}

fn share(user: &str, relation: &str) -> ShareDocumentRequest {
    ShareDocumentRequest {
        user_id: user.to_string(),
        relation: relation.to_string(),
    }
}

#[tokio::test]
async fn test_create_writes_owner_and_organization_tuples() {
    let (service, fga) = setup();

    let document = service.create(&alice(), new_document("Plan")).await.unwrap();
    assert_eq!(document.owner_id, "alice");
    assert_eq!(document.organization_id, "acme");
    assert_eq!(document.created_at, document.updated_at);

    assert_eq!(service.get(&document.id).await.unwrap(), document);
    assert!(fga.contains(&Tuple::new(
        Subject::user("alice"),
        Relation::Owner,
        Object::document(&document.id)
    )));
    assert!(fga.contains(&Tuple::new(
        Subject::organization("acme"),
        Relation::Organization,
        Object::document(&document.id)
    )));
}

#[tokio::test]
async fn test_create_prefers_requested_organization() {
    let (service, _fga) = setup();

    let mut request = new_document("Plan");
    request.organization_id = Some("globex".to_string());
    let document = service.create(&alice(), request).await.unwrap();
    assert_eq!(document.organization_id, "globex");

    // no organization anywhere
    let result = service
        .create(&RequestContext::new("carol"), new_document("Orphan"))
        .await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));
}

#[tokio::test]
async fn test_create_validates_before_calling_the_service() {
    let (service, fga) = setup();

    let mut missing_title = new_document("x");
    missing_title.title = String::new();
    let mut missing_content = new_document("x");
    missing_content.content = "   ".to_string();

    for request in [missing_title, missing_content] {
        let result = service.create(&alice(), request).await;
        assert!(matches!(result, Err(ApiError::Validation { .. })));
    }
    assert_eq!(fga.total_calls(), 0);
    assert!(service.store().is_empty());
}

#[tokio::test]
async fn test_failed_tuple_write_rolls_back_create() {
    let (service, fga) = setup();
    fga.fail_writes(true);

    let result = service.create(&alice(), new_document("Plan")).await;
    assert!(matches!(result, Err(ApiError::AuthorizationService(_))));
    assert!(service.store().is_empty());
    assert_eq!(fga.tuple_count(), 0);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found_without_service_calls() {
    let (service, fga) = setup();

    assert!(matches!(service.get("missing").await, Err(ApiError::NotFound { .. })));
    assert!(matches!(
        service.update("missing", UpdateDocumentRequest::default()).await,
        Err(ApiError::NotFound { .. })
    ));
    assert!(matches!(service.delete("missing").await, Err(ApiError::NotFound { .. })));
    assert!(matches!(
        service.share("missing", share("bob", "viewer")).await,
        Err(ApiError::NotFound { .. })
    ));
    assert_eq!(fga.total_calls(), 0);
}

#[tokio::test]
async fn test_update_with_empty_fields_only_touches_timestamp() {
    let (service, _fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let updated = service
        .update(
            &document.id,
            UpdateDocumentRequest {
                title: Some(String::new()),
                content: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, document.title);
    assert_eq!(updated.content, document.content);
    assert!(updated.updated_at > document.updated_at);
    assert_eq!(updated.created_at, document.created_at);

    let renamed = service
        .update(
            &document.id,
            UpdateDocumentRequest {
                title: Some("Renamed".to_string()),
                content: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed");
    assert_eq!(renamed.content, document.content);
}

#[tokio::test]
async fn test_delete_succeeds_even_when_tuple_delete_fails() {
    let (service, fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();

    fga.fail_deletes(true);
    service.delete(&document.id).await.unwrap();

    assert!(matches!(service.get(&document.id).await, Err(ApiError::NotFound { .. })));
    // tuples are orphaned, not rolled back into the store
    assert_eq!(fga.tuple_count(), 2);
    assert!(matches!(service.delete(&document.id).await, Err(ApiError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_removes_tuples() {
    let (service, fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();

    service.delete(&document.id).await.unwrap();
    assert_eq!(fga.tuple_count(), 0);
}

#[tokio::test]
async fn test_share_validation_happens_before_service_calls() {
    let (service, fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();
    let before = fga.total_calls();

    for relation in ["owner", "organization", "can_view", "admin", ""] {
        let result = service.share(&document.id, share("bob", relation)).await;
        assert!(
            matches!(result, Err(ApiError::Validation { .. })),
            "relation '{}' accepted",
            relation
        );
    }
    let result = service.share(&document.id, share("", "viewer")).await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));

    assert_eq!(fga.total_calls(), before);
}

#[tokio::test]
async fn test_share_and_unshare() {
    let (service, fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();

    service.share(&document.id, share("bob", "viewer")).await.unwrap();
    service.share(&document.id, share("carol", "editor")).await.unwrap();
    assert!(fga
        .check(&Subject::user("bob"), Relation::CanView, &Object::document(&document.id))
        .await
        .unwrap());

    // owner and organization tuples are not shares
    let shares = service.shares(&document.id).await.unwrap();
    assert_eq!(
        shares,
        vec![
            ShareEntry {
                user: "user:carol".to_string(),
                relation: "editor".to_string()
            },
            ShareEntry {
                user: "user:bob".to_string(),
                relation: "viewer".to_string()
            },
        ]
    );

    service.unshare(&document.id, share("bob", "viewer")).await.unwrap();
    assert!(!fga
        .check(&Subject::user("bob"), Relation::CanView, &Object::document(&document.id))
        .await
        .unwrap());

    fga.fail_deletes(true);
    let result = service.unshare(&document.id, share("carol", "editor")).await;
    assert!(matches!(result, Err(ApiError::AuthorizationService(_))));
}

#[tokio::test]
async fn test_list_returns_only_viewable_documents() {
    let (service, fga) = setup();
    let first = service.create(&alice(), new_document("First")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = service.create(&alice(), new_document("Second")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let third = service.create(&alice(), new_document("Third")).await.unwrap();

    service.share(&second.id, share("bob", "viewer")).await.unwrap();
    service.share(&third.id, share("bob", "editor")).await.unwrap();

    let ids: Vec<String> = service.list(&bob()).await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![second.id.clone(), third.id.clone()]);

    // a failing check hides only that document
    fga.fail_checks_on(Object::document(&second.id));
    let ids: Vec<String> = service.list(&alice()).await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);
}

#[tokio::test]
async fn test_permissions_summary() {
    let (service, fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();
    service.share(&document.id, share("bob", "editor")).await.unwrap();

    assert_eq!(
        service.permissions(&alice(), &document.id).await.unwrap(),
        DocumentPermissions {
            can_view: true,
            can_edit: true,
            can_delete: true
        }
    );
    assert_eq!(
        service.permissions(&bob(), &document.id).await.unwrap(),
        DocumentPermissions {
            can_view: true,
            can_edit: true,
            can_delete: false
        }
    );

    fga.fail_checks_on(Object::document(&document.id));
    assert!(matches!(
        service.permissions(&bob(), &document.id).await,
        Err(ApiError::AuthorizationService(FgaError::BatchItem { index: 0, .. }))
    ));
}

#[tokio::test]
async fn test_documents_by_relation() {
    let (service, fga) = setup();
    let owned = service.create(&alice(), new_document("Owned")).await.unwrap();
    let shared = service.create(&bob(), new_document("Shared")).await.unwrap();
    service.share(&shared.id, share("alice", "viewer")).await.unwrap();

    let deletable: Vec<String> = service
        .by_relation(&alice(), "can_delete")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(deletable, vec![owned.id.clone()]);

    let viewable = service.by_relation(&alice(), "can_view").await.unwrap();
    assert_eq!(viewable.len(), 2);

    assert!(matches!(
        service.by_relation(&alice(), "admin").await,
        Err(ApiError::Validation { .. })
    ));

    fga.fail_list_objects(true);
    assert!(matches!(
        service.by_relation(&alice(), "can_view").await,
        Err(ApiError::AuthorizationService(_))
    ));
}

#[tokio::test]
async fn test_by_relation_rejects_relations_documents_do_not_define() {
    let (service, fga) = setup();
    service.create(&alice(), new_document("Plan")).await.unwrap();

    match service.by_relation(&alice(), "member").await {
        Err(ApiError::Validation { field_errors, .. }) => {
            assert!(field_errors.unwrap().contains_key("relation"));
        }
        other => panic!("unexpected result: {:?}", other.map(|docs| docs.len())),
    }
    assert_eq!(fga.calls().list_objects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_back_to_back_updates_advance_timestamp() {
    let (service, _fga) = setup();
    let document = service.create(&alice(), new_document("Plan")).await.unwrap();

    let mut previous = document.updated_at;
    for _ in 0..20 {
        let updated = service
            .update(&document.id, UpdateDocumentRequest::default())
            .await
            .unwrap();
        assert!(updated.updated_at > previous);
        previous = updated.updated_at;
    }
}
