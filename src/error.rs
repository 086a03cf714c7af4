//! Error types for docsplice.
//!
//! Failures fall into three groups that callers react to differently:
//!
//! - **Plan errors**: the caller handed us a malformed or unsatisfiable plan
//!   (bad page selector, unknown document, page out of range).
//! - **Environment errors**: the plan is fine but the world is not (missing
//!   files, documents without a PDF, unwritable scratch space, a dead queue).
//! - **Consumption errors**: a produced file failed ingestion after dispatch;
//!   compensating rollback has already run by the time this surfaces.
//!
//! [`Error::kind`] exposes the classification so integration layers can map
//! plan errors to caller feedback and environment errors to operational
//! alerts without matching on every variant.

use std::io;
use std::path::PathBuf;

use crate::document::DocumentId;

/// Result type alias for docsplice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification, see [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The plan itself is invalid; retrying without changing it cannot help.
    Plan,
    /// A file, PDF or collaborator the plan needs is unavailable.
    Environment,
    /// Ingestion of a produced file failed after dispatch.
    Consumption,
}

/// Main error type for split/merge plan execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A page selector token matched neither `DIGITS` nor `DIGITS-DIGITS`.
    #[error("invalid page range: {token:?}")]
    InvalidPageRange {
        /// The offending token, exactly as it appeared between commas.
        token: String,
    },

    /// A selected page lies outside the source document's page count.
    #[error("page {page} is out of range for document {document}")]
    PageOutOfRange {
        /// The 1-based page index that was requested.
        page: u32,
        /// The source document it was requested from.
        document: DocumentId,
    },

    /// The plan referenced a document the store does not know.
    #[error("document {id} does not exist")]
    DocumentNotFound {
        /// The unknown document id.
        id: DocumentId,
    },

    /// The document is neither a PDF nor has an archived PDF version.
    #[error("document {id} does not have a PDF")]
    NoPdfAvailable {
        /// The document lacking a PDF rendition.
        id: DocumentId,
    },

    /// The resolved PDF path does not exist on disk.
    #[error("{} does not exist", .path.display())]
    MissingFile {
        /// The path that was expected to exist.
        path: PathBuf,
    },

    /// A metadata mode string was neither `redo` nor `copy_first`.
    #[error("invalid metadata mode: {value:?}")]
    InvalidMetadataMode {
        /// The rejected input.
        value: String,
    },

    /// A source PDF could not be parsed.
    #[error("failed to load PDF {}: {reason}", .path.display())]
    FailedToLoadPdf {
        /// Path to the unreadable PDF.
        path: PathBuf,
        /// Parser diagnostics.
        reason: String,
    },

    /// Manipulating the output document's object graph failed.
    #[error("failed to assemble target document: {reason}")]
    AssemblyFailed {
        /// What went wrong.
        reason: String,
    },

    /// Writing an output file to the scratch directory failed.
    #[error("failed to write output under {}", .path.display())]
    FailedToWrite {
        /// The scratch location being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A consume task failed during batch ingestion.
    ///
    /// By the time this propagates, documents created earlier in the same
    /// batch have already been deleted again.
    #[error("consume task {index} failed: {source}")]
    Consumption {
        /// Zero-based index of the failed task within its batch.
        index: usize,
        /// The collaborator's failure.
        source: anyhow::Error,
    },

    /// The background consume queue is no longer accepting batches.
    #[error("consume queue is closed")]
    QueueClosed,
}

impl Error {
    /// Create an [`Error::AssemblyFailed`].
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::AssemblyFailed {
            reason: reason.into(),
        }
    }

    /// Classify this error, see the module docs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPageRange { .. }
            | Self::PageOutOfRange { .. }
            | Self::DocumentNotFound { .. }
            | Self::InvalidMetadataMode { .. } => ErrorKind::Plan,
            Self::NoPdfAvailable { .. }
            | Self::MissingFile { .. }
            | Self::FailedToLoadPdf { .. }
            | Self::AssemblyFailed { .. }
            | Self::FailedToWrite { .. }
            | Self::QueueClosed => ErrorKind::Environment,
            Self::Consumption { .. } => ErrorKind::Consumption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let err = Error::InvalidPageRange {
            token: "1-".to_string(),
        };
        assert!(format!("{err}").contains("\"1-\""));

        let err = Error::PageOutOfRange {
            page: 4,
            document: 17,
        };
        let msg = format!("{err}");
        assert!(msg.contains("page 4"));
        assert!(msg.contains("document 17"));

        let err = Error::MissingFile {
            path: PathBuf::from("/tmp/archive/0000017.pdf"),
        };
        assert!(format!("{err}").contains("0000017.pdf"));
    }

    #[test]
    fn kind_classification() {
        assert_eq!(
            Error::InvalidPageRange { token: "x".into() }.kind(),
            ErrorKind::Plan
        );
        assert_eq!(Error::DocumentNotFound { id: 1 }.kind(), ErrorKind::Plan);
        assert_eq!(
            Error::NoPdfAvailable { id: 1 }.kind(),
            ErrorKind::Environment
        );
        assert_eq!(
            Error::MissingFile {
                path: PathBuf::from("x")
            }
            .kind(),
            ErrorKind::Environment
        );
        assert_eq!(Error::QueueClosed.kind(), ErrorKind::Environment);
        assert_eq!(
            Error::Consumption {
                index: 0,
                source: anyhow::anyhow!("boom")
            }
            .kind(),
            ErrorKind::Consumption
        );
    }

    #[test]
    fn consumption_preserves_cause() {
        let err = Error::Consumption {
            index: 2,
            source: anyhow::anyhow!("duplicate checksum"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("task 2"));
        assert!(msg.contains("duplicate checksum"));
    }
}
