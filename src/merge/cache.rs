//! Memoized PDF handles for one plan execution.
//!
//! Split/merge plans routinely reference the same source document from
//! several targets. Parsing a PDF is the expensive step, so handles are
//! opened lazily and memoized per document id for the lifetime of a single
//! execution call. The cache is owned by that call — it is not a shared
//! structure and must not outlive the execution it was created for.

use std::collections::HashMap;

use lopdf::Document as Pdf;

use crate::document::{Document, DocumentId};
use crate::error::{Error, Result};

/// Lazily opened, memoized PDF handles keyed by document id.
#[derive(Debug, Default)]
pub struct PdfHandleCache {
    handles: HashMap<DocumentId, Pdf>,
}

impl PdfHandleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the PDF behind `document`, reusing a previously opened handle.
    ///
    /// A cache hit performs no I/O at all. On a miss the path is resolved
    /// from the record: the original file when it is itself a PDF,
    /// otherwise the archived PDF rendition.
    ///
    /// # Errors
    ///
    /// - [`Error::NoPdfAvailable`] when the document is not a PDF and has
    ///   no archive version.
    /// - [`Error::MissingFile`] when the resolved path is gone from disk.
    /// - [`Error::FailedToLoadPdf`] when the file exists but cannot be
    ///   parsed.
    pub async fn open_from_document(&mut self, document: &Document) -> Result<&Pdf> {
        if self.handles.contains_key(&document.id) {
            return Ok(&self.handles[&document.id]);
        }

        let path = if document.is_pdf() {
            document.source_path.clone()
        } else if let Some(archive_path) = &document.archive_path {
            archive_path.clone()
        } else {
            return Err(Error::NoPdfAvailable { id: document.id });
        };

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::MissingFile { path });
        }

        let pdf = Pdf::load(&path)
            .await
            .map_err(|e| Error::FailedToLoadPdf {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!("opened document {} from {}", document.id, path.display());
        Ok(self.handles.entry(document.id).or_insert(pdf))
    }

    /// Release every cached handle and clear the cache.
    ///
    /// The executor calls this unconditionally at the end of a plan
    /// execution; dropping the cache has the same effect.
    pub fn close_all(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!("releasing {} cached PDF handles", self.handles.len());
        }
        self.handles.clear();
    }

    /// Number of currently cached handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the cache holds no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
