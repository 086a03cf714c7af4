//! Read-only document records and the lookup seam.
//!
//! The engine never owns document persistence. It sees documents through
//! [`DocumentStore`], a narrow read-only capability, and works with plain
//! [`Document`] value records. Page counts are deliberately absent from the
//! record: they are derived from the opened PDF during assembly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a stored document.
pub type DocumentId = i64;

/// MIME type of documents that can be opened directly.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A stored document's attributes, as seen by the split/merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier within the owning store.
    pub id: DocumentId,
    /// Human-readable title.
    pub title: String,
    /// MIME type of the original file.
    pub mime_type: String,
    /// Path to the original file.
    pub source_path: PathBuf,
    /// Path to the archived PDF rendition, if one was generated.
    pub archive_path: Option<PathBuf>,
    /// Assigned correspondent, if any.
    pub correspondent_id: Option<i64>,
    /// Assigned document type, if any.
    pub document_type_id: Option<i64>,
    /// Assigned tags.
    pub tag_ids: Vec<i64>,
    /// Creation timestamp of the document record.
    pub created: DateTime<Utc>,
}

impl Document {
    /// Whether the original file is itself a PDF.
    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }

    /// Whether an archived PDF rendition exists.
    pub fn has_archive_version(&self) -> bool {
        self.archive_path.is_some()
    }
}

/// Read-only document lookup.
///
/// Implementations are expected to be cheap to call; the engine resolves
/// each source spec exactly once per plan execution.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document record by id, or `None` if it does not exist.
    fn get(&self, id: DocumentId) -> Option<Document>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn get(&self, id: DocumentId) -> Option<Document> {
        (**self).get(id)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, id: DocumentId) -> Option<Document> {
        (**self).get(id)
    }
}

/// In-memory [`DocumentStore`] for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: HashMap<DocumentId, Document>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document record, keyed by its id.
    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.id, document);
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: DocumentId) -> Option<Document> {
        self.documents.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: DocumentId) -> Document {
        Document {
            id,
            title: format!("document {id}"),
            mime_type: PDF_MIME_TYPE.to_string(),
            source_path: PathBuf::from(format!("/documents/{id:07}.pdf")),
            archive_path: None,
            correspondent_id: None,
            document_type_id: None,
            tag_ids: Vec::new(),
            created: Utc.with_ymd_and_hms(2020, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn archive_version_follows_archive_path() {
        let mut doc = record(1);
        assert!(!doc.has_archive_version());
        doc.archive_path = Some(PathBuf::from("/archive/0000001.pdf"));
        assert!(doc.has_archive_version());
    }

    #[test]
    fn pdf_detection_is_exact() {
        let mut doc = record(1);
        assert!(doc.is_pdf());
        doc.mime_type = "image/jpeg".to_string();
        assert!(!doc.is_pdf());
    }

    #[test]
    fn memory_store_lookup() {
        let mut store = MemoryStore::new();
        store.insert(record(1));
        store.insert(record(2));

        assert_eq!(store.get(1).unwrap().id, 1);
        assert!(store.get(3).is_none());
    }

    #[test]
    fn store_is_usable_through_references() {
        let mut store = MemoryStore::new();
        store.insert(record(5));

        fn by_ref<S: DocumentStore>(store: S) -> Option<Document> {
            store.get(5)
        }

        assert!(by_ref(&store).is_some());
        assert!(by_ref(Arc::new(store)).is_some());
    }
}
