use crate::models::Document;
use dashmap::DashMap;

/// In-process document storage, keyed by document id
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<String, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.get(id).map(|entry| entry.value().clone())
    }

    /// Apply `f` to the stored document and return the updated copy
    pub fn update<F>(&self, id: &str, f: F) -> Option<Document>
    where
        F: FnOnce(&mut Document),
    {
        let mut entry = self.documents.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<Document> {
        self.documents.remove(id).map(|(_, document)| document)
    }

    /// All documents, oldest first
    pub fn list(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
