//! Split/merge plan execution.
//!
//! [`PlanExecutor`] walks a plan strictly in order — targets, then sources
//! within each target — because two pieces of behavior depend on
//! determinism: the output version is accumulated as a running maximum, and
//! document metadata comes exclusively from the *first* source of each
//! target. There is no internal parallelism.
//!
//! Any failure aborts the whole call before anything is dispatched for
//! ingestion, so a malformed plan can never queue a job. Files already
//! persisted for earlier targets of the same call are left in the scratch
//! directory; cleaning those up is the caller's concern.

use lopdf::Document as Pdf;

use crate::consume::ConsumeTask;
use crate::dispatch::{ConsumeBatch, ConsumeQueue};
use crate::document::{Document, DocumentStore};
use crate::error::{Error, Result};
use crate::io::ScratchWriter;
use crate::merge::assembly::TargetBuilder;
use crate::merge::cache::PdfHandleCache;
use crate::pages::parse_page_list;
use crate::plan::{MetadataMode, Plan, SplitMergeOptions, TargetSpec};

/// Executes split/merge plans against a document store.
pub struct PlanExecutor<S> {
    store: S,
    queue: ConsumeQueue,
}

impl<S: DocumentStore> PlanExecutor<S> {
    /// Create an executor reading documents from `store` and dispatching
    /// non-preview batches to `queue`.
    pub fn new(store: S, queue: ConsumeQueue) -> Self {
        Self { store, queue }
    }

    /// Execute one plan.
    ///
    /// Builds every target in plan order and persists each as a
    /// collision-resistant file under the scratch directory. In preview
    /// mode the produced [`ConsumeTask`]s are returned and nothing else
    /// happens. Otherwise one [`ConsumeBatch`] carrying all tasks — and,
    /// with `delete_source`, the de-duplicated set of every referenced
    /// source id — is enqueued before returning.
    ///
    /// The PDF handle cache lives exactly as long as this call; it is
    /// released on every exit path.
    ///
    /// # Errors
    ///
    /// Any parse, lookup, range or file failure aborts the call before any
    /// dispatch. See [`Error::kind`](crate::Error::kind) for how callers
    /// should triage.
    pub async fn execute(
        &self,
        plan: &Plan,
        options: &SplitMergeOptions,
    ) -> Result<Vec<ConsumeTask>> {
        let writer = ScratchWriter::new(&options.scratch_dir);
        let mut cache = PdfHandleCache::new();

        let outcome = self.assemble_all(plan, options, &writer, &mut cache).await;
        cache.close_all();
        let tasks = outcome?;

        if !options.preview {
            let delete_document_ids = options
                .delete_source
                .then(|| plan.source_document_ids());
            tracing::debug!(
                "dispatching batch of {} files for consumption",
                tasks.len()
            );
            self.queue
                .enqueue(ConsumeBatch {
                    tasks: tasks.clone(),
                    delete_document_ids,
                })
                .await?;
        }

        Ok(tasks)
    }

    async fn assemble_all(
        &self,
        plan: &Plan,
        options: &SplitMergeOptions,
        writer: &ScratchWriter,
        cache: &mut PdfHandleCache,
    ) -> Result<Vec<ConsumeTask>> {
        let mut tasks = Vec::with_capacity(plan.targets.len());
        for target in &plan.targets {
            tasks.push(self.assemble_target(target, options, writer, cache).await?);
        }
        Ok(tasks)
    }

    /// Build, compact and persist one target, returning its consume task.
    async fn assemble_target(
        &self,
        target: &TargetSpec,
        options: &SplitMergeOptions,
        writer: &ScratchWriter,
        cache: &mut PdfHandleCache,
    ) -> Result<ConsumeTask> {
        let mut builder = TargetBuilder::new();
        let mut task = ConsumeTask::new("");

        for (i, source) in target.sources.iter().enumerate() {
            let pages = match source.pages.as_deref() {
                Some(selector) => Some(parse_page_list(selector)?),
                None => None,
            };

            let document = self
                .store
                .get(source.document)
                .ok_or(Error::DocumentNotFound {
                    id: source.document,
                })?;

            let pdf: &Pdf = cache.open_from_document(&document).await?;
            builder.observe_version(&pdf.version);
            builder.import_source(document.id, pdf);

            if i == 0 {
                task.override_title = document.title.clone();
                builder.copy_info_from(pdf);
                if options.metadata == MetadataMode::CopyFirst {
                    copy_document_metadata(&document, &mut task);
                }
            }

            let page_count = builder
                .imported_page_count(document.id)
                .unwrap_or(0);

            match pages {
                Some(pages) => {
                    for page in pages {
                        if page < 1 || page as usize > page_count {
                            return Err(Error::PageOutOfRange {
                                page,
                                document: document.id,
                            });
                        }
                        builder.append_page(document.id, page)?;
                    }
                }
                None => {
                    for page in 1..=page_count as u32 {
                        builder.append_page(document.id, page)?;
                    }
                }
            }
        }

        let document = builder.finish();
        task.path = writer.persist(document).await?;
        Ok(task)
    }
}

/// Propagate the first source's document attributes onto the consume task.
///
/// Correspondent and type carry over as-is (absent stays absent), tags only
/// when the source has any, the creation date always.
fn copy_document_metadata(document: &Document, task: &mut ConsumeTask) {
    task.override_correspondent_id = document.correspondent_id;
    task.override_document_type_id = document.document_type_id;
    if !document.tag_ids.is_empty() {
        task.override_tag_ids = Some(document.tag_ids.clone());
    }
    task.override_date = Some(document.created);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentId, MemoryStore, PDF_MIME_TYPE};
    use crate::merge::assembly::tests::{page_widths, source_pdf};
    use crate::plan::SourceSpec;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Fixture {
        store: MemoryStore,
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                dir: TempDir::new().unwrap(),
            }
        }

        /// Store a PDF document whose page `i` has MediaBox width
        /// `widths[i - 1]`.
        fn add_pdf(&mut self, id: DocumentId, version: &str, widths: &[i64]) {
            let path = self.dir.path().join(format!("{id:07}.pdf"));
            source_pdf(version, widths).save(&path).unwrap();
            self.store.insert(Document {
                id,
                title: format!("document {id}"),
                mime_type: PDF_MIME_TYPE.to_string(),
                source_path: path,
                archive_path: None,
                correspondent_id: None,
                document_type_id: None,
                tag_ids: Vec::new(),
                created: Utc.with_ymd_and_hms(2020, 12, 1, 0, 0, 0).unwrap(),
            });
        }

        fn executor(&self) -> (PlanExecutor<&MemoryStore>, mpsc::Receiver<ConsumeBatch>) {
            let (tx, rx) = mpsc::channel(4);
            (PlanExecutor::new(&self.store, ConsumeQueue::new(tx)), rx)
        }

        fn options(&self) -> SplitMergeOptions {
            SplitMergeOptions::new(self.dir.path().join("scratch"))
        }
    }

    async fn widths_of(path: &Path) -> Vec<i64> {
        let doc = Pdf::load(path).await.unwrap();
        page_widths(&doc)
    }

    fn scratch(options: &SplitMergeOptions) {
        std::fs::create_dir_all(&options.scratch_dir).unwrap();
    }

    #[tokio::test]
    async fn selector_keeps_requested_pages_only() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102, 103]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::with_pages(1, "1,3")].into()]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(widths_of(&tasks[0].path).await, vec![101, 103]);
    }

    #[tokio::test]
    async fn no_selector_concatenates_whole_sources() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102, 103]);
        fixture.add_pdf(2, "1.4", &[201, 202]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::all_pages(2), SourceSpec::all_pages(1)].into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        assert_eq!(
            widths_of(&tasks[0].path).await,
            vec![201, 202, 101, 102, 103]
        );
    }

    #[tokio::test]
    async fn split_produces_one_file_per_target() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102, 103]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::with_pages(1, "1,2")].into(),
            vec![SourceSpec::with_pages(1, "3")].into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(widths_of(&tasks[0].path).await, vec![101, 102]);
        assert_eq!(widths_of(&tasks[1].path).await, vec![103]);
        assert_ne!(tasks[0].path, tasks[1].path);
    }

    #[tokio::test]
    async fn reorder_and_partial_merge() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102, 103]);
        fixture.add_pdf(2, "1.4", &[201, 202]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![
            vec![
                SourceSpec::with_pages(1, "3,1"),
                SourceSpec::with_pages(2, "2"),
            ]
            .into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        assert_eq!(widths_of(&tasks[0].path).await, vec![103, 101, 202]);
    }

    #[tokio::test]
    async fn empty_selector_contributes_zero_pages() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102]);
        fixture.add_pdf(2, "1.4", &[201]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::with_pages(1, ""), SourceSpec::all_pages(2)].into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        // document 1 still wins the title as first source
        assert_eq!(tasks[0].override_title, "document 1");
        assert_eq!(widths_of(&tasks[0].path).await, vec![201]);
    }

    #[tokio::test]
    async fn output_version_is_the_maximum_of_sources() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        fixture.add_pdf(2, "1.7", &[201]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::all_pages(1), SourceSpec::all_pages(2)].into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        let doc = Pdf::load(&tasks[0].path).await.unwrap();
        assert_eq!(doc.version, "1.7");
    }

    #[tokio::test]
    async fn unknown_document_aborts_the_call() {
        let fixture = Fixture::new();
        let (executor, mut rx) = fixture.executor();
        let mut options = fixture.options();
        options.preview = false;
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::all_pages(3456)].into()]);
        let err = executor.execute(&plan, &options).await.unwrap_err();

        assert!(matches!(err, Error::DocumentNotFound { id: 3456 }));
        // nothing may be dispatched for a failed plan
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn out_of_range_page_names_page_and_document() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102, 103]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::with_pages(1, "4")].into()]);
        let err = executor.execute(&plan, &options).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PageOutOfRange {
                page: 4,
                document: 1
            }
        ));
    }

    #[tokio::test]
    async fn malformed_selector_aborts_before_dispatch() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        let (executor, mut rx) = fixture.executor();
        let mut options = fixture.options();
        options.preview = false;
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::with_pages(1, "1,,2")].into()]);
        let err = executor.execute(&plan, &options).await.unwrap_err();

        assert!(matches!(err, Error::InvalidPageRange { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn preview_returns_tasks_without_dispatching() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        let (executor, mut rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::all_pages(1)].into()]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].path.exists());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_preview_dispatches_one_batch() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        let (executor, mut rx) = fixture.executor();
        let mut options = fixture.options();
        options.preview = false;
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::all_pages(1)].into()]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.tasks, tasks);
        assert_eq!(batch.delete_document_ids, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_source_collects_every_referenced_id_once() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101, 102]);
        fixture.add_pdf(2, "1.4", &[201]);
        let (executor, mut rx) = fixture.executor();
        let mut options = fixture.options();
        options.preview = false;
        options.delete_source = true;
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::with_pages(1, "1"), SourceSpec::all_pages(2)].into(),
            vec![SourceSpec::with_pages(1, "2")].into(),
        ]);
        executor.execute(&plan, &options).await.unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.delete_document_ids, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn copy_first_takes_metadata_from_the_first_source_only() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        fixture.add_pdf(2, "1.4", &[201]);
        {
            let doc2 = fixture.store.get(2).unwrap();
            fixture.store.insert(Document {
                title: "titleB".to_string(),
                correspondent_id: Some(31),
                document_type_id: Some(41),
                tag_ids: vec![51],
                created: Utc.with_ymd_and_hms(2020, 2, 20, 0, 0, 0).unwrap(),
                ..doc2
            });
            let doc1 = fixture.store.get(1).unwrap();
            fixture.store.insert(Document {
                title: "titleA".to_string(),
                correspondent_id: Some(32),
                document_type_id: Some(42),
                tag_ids: vec![52],
                ..doc1
            });
        }
        let (executor, _rx) = fixture.executor();
        let mut options = fixture.options();
        options.metadata = MetadataMode::CopyFirst;
        scratch(&options);

        let plan = Plan::new(vec![
            vec![SourceSpec::all_pages(2), SourceSpec::all_pages(1)].into(),
        ]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        let task = &tasks[0];
        assert_eq!(task.override_title, "titleB");
        assert_eq!(task.override_correspondent_id, Some(31));
        assert_eq!(task.override_document_type_id, Some(41));
        assert_eq!(task.override_tag_ids, Some(vec![51]));
        assert_eq!(
            task.override_date,
            Some(Utc.with_ymd_and_hms(2020, 2, 20, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn redo_mode_leaves_overrides_unset() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        {
            let doc1 = fixture.store.get(1).unwrap();
            fixture.store.insert(Document {
                correspondent_id: Some(31),
                tag_ids: vec![51],
                ..doc1
            });
        }
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::all_pages(1)].into()]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        let task = &tasks[0];
        assert_eq!(task.override_title, "document 1");
        assert_eq!(task.override_correspondent_id, None);
        assert_eq!(task.override_tag_ids, None);
        assert_eq!(task.override_date, None);
    }

    #[tokio::test]
    async fn produced_files_use_scratch_naming() {
        let mut fixture = Fixture::new();
        fixture.add_pdf(1, "1.4", &[101]);
        let (executor, _rx) = fixture.executor();
        let options = fixture.options();
        scratch(&options);

        let plan = Plan::new(vec![vec![SourceSpec::all_pages(1)].into()]);
        let tasks = executor.execute(&plan, &options).await.unwrap();

        let name = tasks[0].path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("merge_"));
        assert!(name.ends_with("_pdf"));
        assert_eq!(tasks[0].path.parent().unwrap(), options.scratch_dir);
    }
}
