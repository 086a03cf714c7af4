//! docsplice - Split and merge PDF documents into new ingestible files.
//!
//! Given a *plan* — an ordered list of targets, each assembled from pages of
//! existing source documents — this library produces new PDF files and hands
//! them to an ingestion pipeline with transactional, all-or-nothing
//! semantics. It supports:
//!
//! - Page selection with reordering, duplication and descending ranges
//! - Merging excerpts of several sources into one output
//! - PDF version preservation (outputs never downgrade below any source)
//! - Metadata propagation from the first source of each target
//! - Memoized source handles across a multi-target plan
//! - Compensating rollback when a batch fails ingestion halfway
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use docsplice::dispatch::spawn_consume_worker;
//! use docsplice::document::MemoryStore;
//! use docsplice::merge::PlanExecutor;
//! use docsplice::plan::{Plan, SplitMergeOptions};
//!
//! # async fn example(
//! #     store: MemoryStore,
//! #     ingestor: Arc<impl docsplice::consume::Ingest + 'static>,
//! # ) -> docsplice::Result<()> {
//! let queue = spawn_consume_worker(ingestor);
//! let executor = PlanExecutor::new(store, queue);
//!
//! let plan: Plan = serde_json::from_str(
//!     r#"[[{"document": 2}, {"document": 1, "pages": "1-3"}]]"#,
//! ).unwrap();
//!
//! let mut options = SplitMergeOptions::new("/tmp/scratch");
//! options.preview = false;
//!
//! let tasks = executor.execute(&plan, &options).await?;
//! println!("queued {} files for ingestion", tasks.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consume;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod io;
pub mod merge;
pub mod pages;
pub mod plan;

// Re-export commonly used types
pub use consume::{consume_many, ConsumeTask, Ingest};
pub use dispatch::{spawn_consume_worker, ConsumeBatch, ConsumeQueue};
pub use document::{Document, DocumentId, DocumentStore, MemoryStore};
pub use error::{Error, ErrorKind, Result};
pub use merge::{PdfHandleCache, PlanExecutor};
pub use pages::parse_page_list;
pub use plan::{MetadataMode, Plan, SourceSpec, SplitMergeOptions, TargetSpec};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
