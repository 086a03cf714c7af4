//! Batch ingestion of produced files with compensating rollback.
//!
//! The engine hands finished files to an external ingestion collaborator,
//! one [`ConsumeTask`] per file. A batch is all-or-nothing from the caller's
//! perspective: if any task fails, every document created earlier in the
//! same batch is deleted again before the failure propagates.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::{Error, Result};

/// Instruction to ingest one produced file as a new document.
///
/// This is a pure value: it carries no handles and is safe to move across
/// the async dispatch boundary or serialize into a job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeTask {
    /// The produced file.
    pub path: PathBuf,
    /// Title for the new document.
    pub override_title: String,
    /// Correspondent for the new document, if propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_correspondent_id: Option<i64>,
    /// Document type for the new document, if propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_document_type_id: Option<i64>,
    /// Tags for the new document, if propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_tag_ids: Option<Vec<i64>>,
    /// Creation date for the new document, if propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_date: Option<DateTime<Utc>>,
}

impl ConsumeTask {
    /// A task for `path` with no overrides beyond an empty title.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            override_title: String::new(),
            override_correspondent_id: None,
            override_document_type_id: None,
            override_tag_ids: None,
            override_date: None,
        }
    }
}

/// External ingestion collaborator.
///
/// `consume_file` turns a produced file into a new stored document and
/// returns its id; `delete_document` removes a stored document. Both report
/// failures as opaque [`anyhow::Error`]s — the engine does not interpret
/// them beyond logging and rollback.
#[async_trait]
pub trait Ingest: Send + Sync {
    /// Ingest one file, returning the id of the created document.
    async fn consume_file(&self, task: &ConsumeTask) -> anyhow::Result<DocumentId>;

    /// Delete a stored document.
    async fn delete_document(&self, id: DocumentId) -> anyhow::Result<()>;
}

/// Ingest a batch of tasks sequentially, rolling back on failure.
///
/// On success returns the ids of the created documents, in task order, and
/// — when `delete_document_ids` is given — deletes each listed source
/// document best-effort afterwards (an individual deletion failure is
/// logged, not compensated).
///
/// # Errors
///
/// Returns [`Error::Consumption`] naming the failed task after deleting
/// every document this batch had created so far. Source documents are never
/// deleted on the failure path.
pub async fn consume_many<I>(
    ingestor: &I,
    tasks: &[ConsumeTask],
    delete_document_ids: Option<&[DocumentId]>,
) -> Result<Vec<DocumentId>>
where
    I: Ingest + ?Sized,
{
    let mut created = Vec::with_capacity(tasks.len());

    for (index, task) in tasks.iter().enumerate() {
        match ingestor.consume_file(task).await {
            Ok(id) => created.push(id),
            Err(source) => {
                tracing::warn!(
                    "consume task {index} failed, rolling back {} created documents",
                    created.len()
                );
                for id in created {
                    if let Err(e) = ingestor.delete_document(id).await {
                        tracing::warn!("rollback of document {id} failed: {e}");
                    }
                }
                return Err(Error::Consumption { index, source });
            }
        }
    }

    if let Some(ids) = delete_document_ids {
        for &id in ids {
            if let Err(e) = ingestor.delete_document(id).await {
                tracing::warn!("could not delete source document {id}: {e}");
            }
        }
    }

    Ok(created)
}
