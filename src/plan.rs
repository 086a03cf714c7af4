//! Plan wire types and execution options.
//!
//! A plan is an ordered list of targets; each target is an ordered list of
//! source specs. The serde representation matches the caller-facing JSON
//! shape exactly:
//!
//! ```json
//! [
//!     [ {"document": 2}, {"document": 1, "pages": "1-3"} ],
//!     [ {"document": 1, "pages": "4"} ]
//! ]
//! ```
//!
//! Source order within a target determines append order in the output, and
//! target order determines the order of produced files.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::Error;

/// One source document contribution to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Id of the source document.
    pub document: DocumentId,
    /// Optional page selector.
    ///
    /// `None` means every page of the source in natural order. `Some`,
    /// including `Some("")`, means exactly the parsed sequence — an
    /// explicitly empty selector contributes zero pages. Presence of the
    /// key is what matters, not the truthiness of its value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
}

impl SourceSpec {
    /// A source spec selecting every page of `document`.
    pub fn all_pages(document: DocumentId) -> Self {
        Self {
            document,
            pages: None,
        }
    }

    /// A source spec with an explicit page selector.
    pub fn with_pages(document: DocumentId, pages: impl Into<String>) -> Self {
        Self {
            document,
            pages: Some(pages.into()),
        }
    }
}

/// Recipe for one output document: source excerpts in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSpec {
    /// Ordered source contributions.
    pub sources: Vec<SourceSpec>,
}

impl From<Vec<SourceSpec>> for TargetSpec {
    fn from(sources: Vec<SourceSpec>) -> Self {
        Self { sources }
    }
}

/// A full split/merge specification: targets in production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    /// Ordered target recipes.
    pub targets: Vec<TargetSpec>,
}

impl Plan {
    /// Build a plan from target recipes.
    pub fn new(targets: Vec<TargetSpec>) -> Self {
        Self { targets }
    }

    /// Every source document id referenced anywhere in the plan,
    /// de-duplicated, in ascending order.
    pub fn source_document_ids(&self) -> Vec<DocumentId> {
        let ids: BTreeSet<DocumentId> = self
            .targets
            .iter()
            .flat_map(|target| target.sources.iter().map(|source| source.document))
            .collect();
        ids.into_iter().collect()
    }
}

/// How document-level metadata is assigned to produced documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    /// Produced documents go through classification from scratch.
    #[default]
    Redo,
    /// Correspondent, type, tags and date are copied from the first source
    /// of each target.
    CopyFirst,
}

impl FromStr for MetadataMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "redo" => Ok(Self::Redo),
            "copy_first" => Ok(Self::CopyFirst),
            _ => Err(Error::InvalidMetadataMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Parameters of one plan execution.
#[derive(Debug, Clone)]
pub struct SplitMergeOptions {
    /// Writable directory receiving the produced files.
    pub scratch_dir: PathBuf,
    /// Metadata assignment mode.
    pub metadata: MetadataMode,
    /// Delete every referenced source document after a fully successful
    /// ingestion of the produced files.
    pub delete_source: bool,
    /// Build the files and return their descriptors without dispatching
    /// anything for ingestion.
    pub preview: bool,
}

impl SplitMergeOptions {
    /// Options with the defaults of the interactive flow: `Redo` metadata,
    /// sources kept, preview on.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            metadata: MetadataMode::Redo,
            delete_source: false,
            preview: true,
        }
    }
}
