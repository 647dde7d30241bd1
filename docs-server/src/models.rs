use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document. `owner_id` and `organization_id` never change after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub organization_id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Falls back to the caller's organization when absent
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// Empty or missing fields leave the stored value unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareDocumentRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What the caller may do with one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPermissions {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

/// A direct grant on a document as stored in the authorization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    pub user: String,
    pub relation: String,
}
