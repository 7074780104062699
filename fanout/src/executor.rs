//! Concurrent dispatch of query batches.

use shared::{counter, gauge, histogram};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::errors::{BatchFetchError, Result};
use crate::merger::MergedRecordSet;
use crate::metrics_defs::{
    FANOUT_BATCHES_DISPATCHED, FANOUT_BATCHES_FAILED, FANOUT_BATCHES_IN_FLIGHT, FANOUT_DURATION,
    FANOUT_RECORDS,
};
use crate::splitter::{QueryBatch, split_batches};
use crate::{BatchFetcher, MAX_BATCH};

const DEFAULT_MAX_BATCH: NonZeroUsize = NonZeroUsize::new(MAX_BATCH).unwrap();

/// Result from a single batch task.
struct BatchTaskResult<R> {
    batch: QueryBatch,
    /// Fetcher errors are rendered to strings inside the task
    result: std::result::Result<Vec<R>, String>,
}

/// Spawned batch tasks with tracking metadata.
///
/// A task that panics or is aborted never returns its batch, so the batch is
/// also kept here by task id to name it in the failure.
struct SpawnedBatches<R> {
    join_set: JoinSet<BatchTaskResult<R>>,
    task_batches: HashMap<tokio::task::Id, QueryBatch>,
}

/// Counts a batch task as in flight until its future is dropped, whether it
/// finished or was aborted.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        gauge!(FANOUT_BATCHES_IN_FLIGHT).increment(1.0);
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!(FANOUT_BATCHES_IN_FLIGHT).decrement(1.0);
    }
}

/// Per-batch outcome reported in best-effort mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Fetched {
        index: usize,
        batch: Vec<String>,
        /// Number of records the batch returned, before deduplication
        records: usize,
    },
    Failed(BatchFetchError),
}

impl BatchOutcome {
    pub fn index(&self) -> usize {
        match self {
            BatchOutcome::Fetched { index, .. } => *index,
            BatchOutcome::Failed(err) => err.index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchOutcome::Failed(_))
    }
}

/// Result of a best-effort fan-out: the union of every succeeding batch plus
/// one outcome per dispatched batch, in split order.
#[derive(Debug)]
pub struct BestEffort<R> {
    pub records: MergedRecordSet<R>,
    pub outcomes: Vec<BatchOutcome>,
}

impl<R> BestEffort<R> {
    pub fn failures(&self) -> impl Iterator<Item = &BatchFetchError> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            BatchOutcome::Failed(err) => Some(err),
            BatchOutcome::Fetched { .. } => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.outcomes.iter().any(BatchOutcome::is_failed)
    }
}

/// Resolves an unbounded id set against a backend limited to `max_batch` ids
/// per query.
///
/// The merger holds no state between calls. One instance can be shared by
/// every screen and used concurrently. `max_batch` must match the backend's
/// real limit; it is never discovered.
#[derive(Clone, Copy, Debug)]
pub struct FanOutMerger {
    max_batch: NonZeroUsize,
}

impl FanOutMerger {
    pub fn new() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_max_batch(max_batch: NonZeroUsize) -> Self {
        Self { max_batch }
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch.get()
    }

    /// Fetches every record matching `ids`, failing the whole call on the
    /// first batch failure.
    ///
    /// Remaining batches are aborted once a failure is observed and no
    /// partial result is returned. An empty `ids` returns immediately
    /// without calling the fetcher.
    pub async fn fetch_all<F>(
        &self,
        ids: &[String],
        fetcher: Arc<F>,
    ) -> Result<MergedRecordSet<F::Record>>
    where
        F: BatchFetcher + 'static,
    {
        if ids.is_empty() {
            tracing::debug!("Empty id set, skipping fan-out");
            return Ok(MergedRecordSet::new());
        }

        let started = Instant::now();
        let SpawnedBatches {
            mut join_set,
            mut task_batches,
        } = self.spawn_batches(ids, fetcher);
        let mut merged = MergedRecordSet::new();

        while let Some(join_result) = join_set.join_next_with_id().await {
            match handle_completion(join_result, &mut task_batches) {
                Ok((_, records)) => merged.merge(records),
                Err(err) => {
                    tracing::warn!(
                        batch = err.index,
                        ids = err.batch.len(),
                        error = %err.reason,
                        "Batch failed, aborting {} remaining batches",
                        join_set.len()
                    );
                    join_set.abort_all();
                    return Err(err.into());
                }
            }
        }

        record_completion(started, merged.len());
        Ok(merged)
    }

    /// Fetches every record matching `ids`, waiting for all batches and
    /// reporting each batch's outcome instead of failing.
    pub async fn fetch_best_effort<F>(
        &self,
        ids: &[String],
        fetcher: Arc<F>,
    ) -> BestEffort<F::Record>
    where
        F: BatchFetcher + 'static,
    {
        if ids.is_empty() {
            tracing::debug!("Empty id set, skipping fan-out");
            return BestEffort {
                records: MergedRecordSet::new(),
                outcomes: Vec::new(),
            };
        }

        let started = Instant::now();
        let SpawnedBatches {
            mut join_set,
            mut task_batches,
        } = self.spawn_batches(ids, fetcher);
        let mut merged = MergedRecordSet::new();
        let mut outcomes = Vec::with_capacity(task_batches.len());

        while let Some(join_result) = join_set.join_next_with_id().await {
            match handle_completion(join_result, &mut task_batches) {
                Ok((batch, records)) => {
                    outcomes.push(BatchOutcome::Fetched {
                        index: batch.index,
                        batch: batch.ids,
                        records: records.len(),
                    });
                    merged.merge(records);
                }
                Err(err) => {
                    tracing::warn!(
                        batch = err.index,
                        ids = err.batch.len(),
                        error = %err.reason,
                        "Batch failed, continuing with remaining batches"
                    );
                    outcomes.push(BatchOutcome::Failed(err));
                }
            }
        }

        outcomes.sort_by_key(BatchOutcome::index);
        record_completion(started, merged.len());
        BestEffort {
            records: merged,
            outcomes,
        }
    }

    /// Spawns one task per batch.
    fn spawn_batches<F>(&self, ids: &[String], fetcher: Arc<F>) -> SpawnedBatches<F::Record>
    where
        F: BatchFetcher + 'static,
    {
        let mut join_set = JoinSet::new();
        let mut task_batches = HashMap::new();

        for batch in split_batches(ids, self.max_batch) {
            let tracked = batch.clone();
            let fetcher = fetcher.clone();
            let in_flight = InFlight::start();

            let abort_handle = join_set.spawn(async move {
                let _in_flight = in_flight;
                let result = fetcher
                    .fetch_batch(batch.ids.clone())
                    .await
                    .map_err(|e| e.to_string());

                BatchTaskResult { batch, result }
            });

            task_batches.insert(abort_handle.id(), tracked);
        }

        tracing::debug!(
            ids = ids.len(),
            batches = task_batches.len(),
            max_batch = self.max_batch.get(),
            "Dispatched fan-out batches"
        );
        counter!(FANOUT_BATCHES_DISPATCHED).increment(task_batches.len() as u64);

        SpawnedBatches {
            join_set,
            task_batches,
        }
    }
}

impl Default for FanOutMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles the completion of a single batch task.
///
/// Returns the batch and its records, or the failure naming the batch. A
/// task that panicked is reported with the ids tracked at spawn time.
fn handle_completion<R>(
    join_result: std::result::Result<(tokio::task::Id, BatchTaskResult<R>), tokio::task::JoinError>,
    task_batches: &mut HashMap<tokio::task::Id, QueryBatch>,
) -> std::result::Result<(QueryBatch, Vec<R>), BatchFetchError> {
    let (task_id, task) = match join_result {
        Ok(completed) => completed,
        Err(e) => {
            tracing::error!("Batch task failed: {e}");
            counter!(FANOUT_BATCHES_FAILED).increment(1);
            let batch = task_batches.remove(&e.id()).unwrap_or_default();
            return Err(BatchFetchError {
                index: batch.index,
                batch: batch.ids,
                reason: format!("batch task failed: {e}"),
            });
        }
    };

    task_batches.remove(&task_id);

    match task.result {
        Ok(records) => Ok((task.batch, records)),
        Err(reason) => {
            counter!(FANOUT_BATCHES_FAILED).increment(1);
            Err(BatchFetchError {
                index: task.batch.index,
                batch: task.batch.ids,
                reason,
            })
        }
    }
}

fn record_completion(started: Instant, records: usize) {
    histogram!(FANOUT_DURATION).record(started.elapsed().as_secs_f64());
    histogram!(FANOUT_RECORDS).record(records as f64);
}
