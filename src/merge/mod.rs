//! Split/merge plan execution.
//!
//! This module holds the engine core: the per-execution PDF handle cache,
//! the target assembly machinery, and the executor that walks a plan and
//! turns it into persisted output files.
//!
//! # Examples
//!
//! ```no_run
//! use docsplice::document::MemoryStore;
//! use docsplice::merge::PlanExecutor;
//! use docsplice::plan::{Plan, SourceSpec, SplitMergeOptions};
//!
//! # async fn example(
//! #     store: MemoryStore,
//! #     queue: docsplice::dispatch::ConsumeQueue,
//! # ) -> docsplice::Result<()> {
//! let executor = PlanExecutor::new(store, queue);
//! let plan = Plan::new(vec![
//!     vec![SourceSpec::with_pages(1, "1-3"), SourceSpec::all_pages(2)].into(),
//! ]);
//! let tasks = executor
//!     .execute(&plan, &SplitMergeOptions::new("/tmp/scratch"))
//!     .await?;
//! println!("produced {} files", tasks.len());
//! # Ok(())
//! # }
//! ```

pub mod assembly;
pub mod cache;
pub mod executor;

pub use assembly::TargetBuilder;
pub use cache::PdfHandleCache;
pub use executor::PlanExecutor;
