//! Background dispatch of consume batches.
//!
//! Plan execution ends, in non-preview mode, with exactly one
//! [`ConsumeBatch`] handed to a [`ConsumeQueue`]. The batch is a
//! self-contained value; the worker that drains the queue may run
//! arbitrarily later and shares nothing with the executor that produced it.
//! Once a batch is enqueued it runs to completion — commit or rollback —
//! with no cancellation surface.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::consume::{consume_many, ConsumeTask, Ingest};
use crate::document::DocumentId;
use crate::error::{Error, Result};

/// Queue depth before `enqueue` applies backpressure.
const QUEUE_CAPACITY: usize = 8;

/// One dispatched unit of ingestion work.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeBatch {
    /// Files to ingest, in target order.
    pub tasks: Vec<ConsumeTask>,
    /// Source documents to delete after full success, or `None` to keep
    /// them all.
    pub delete_document_ids: Option<Vec<DocumentId>>,
}

/// Sending half of the consume queue.
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct ConsumeQueue {
    tx: mpsc::Sender<ConsumeBatch>,
}

impl ConsumeQueue {
    /// Wrap an existing channel sender.
    ///
    /// Useful in tests that want to observe dispatched batches instead of
    /// running a worker.
    pub fn new(tx: mpsc::Sender<ConsumeBatch>) -> Self {
        Self { tx }
    }

    /// Enqueue one batch for out-of-band ingestion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the worker has shut down.
    pub async fn enqueue(&self, batch: ConsumeBatch) -> Result<()> {
        self.tx.send(batch).await.map_err(|_| Error::QueueClosed)
    }
}

/// Spawn the background worker draining consume batches.
///
/// Batches are processed strictly in arrival order, one at a time. A failed
/// batch has already rolled its own documents back inside
/// [`consume_many`]; the worker logs the outcome and moves on. The worker
/// stops when every [`ConsumeQueue`] clone is dropped.
pub fn spawn_consume_worker<I>(ingestor: Arc<I>) -> ConsumeQueue
where
    I: Ingest + 'static,
{
    let (tx, mut rx) = mpsc::channel::<ConsumeBatch>(QUEUE_CAPACITY);

    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            let task_count = batch.tasks.len();
            tracing::debug!("consuming batch of {task_count} files");

            match consume_many(
                ingestor.as_ref(),
                &batch.tasks,
                batch.delete_document_ids.as_deref(),
            )
            .await
            {
                Ok(created) => {
                    tracing::info!("batch ingested: {} new documents", created.len());
                }
                Err(e) => {
                    tracing::error!("batch of {task_count} files failed: {e}");
                }
            }
        }
        tracing::debug!("consume worker stopped - queue closed");
    });

    ConsumeQueue::new(tx)
}
