use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::domain::record::{EntityKind, Record};
use crate::error::{GatewayError, Result};
use crate::infrastructure::worker_pool::WorkerPool;

/// A record the server refused, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub record: Record,
    pub error: GatewayError,
}

/// Outcome of submitting one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<RecordFailure>,
}

/// Outcome of flushing every batch of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindReport {
    pub kind: EntityKind,
    pub batches_planned: usize,
    pub batches_submitted: usize,
    /// Batches never started because the run was cancelled.
    pub batches_skipped: usize,
    pub succeeded: usize,
    pub failed: Vec<RecordFailure>,
}

impl KindReport {
    pub fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            batches_planned: 0,
            batches_submitted: 0,
            batches_skipped: 0,
            succeeded: 0,
            failed: Vec::new(),
        }
    }

    fn absorb(&mut self, batch: BatchReport) {
        self.batches_submitted += 1;
        self.succeeded += batch.succeeded;
        self.failed.extend(batch.failed);
    }
}

/// Writes records of a single entity kind in bounded batches through `add<Kind>`.
pub struct BatchWriter {
    kind: EntityKind,
    batch_size: usize,
    pool: WorkerPool,
}

impl BatchWriter {
    pub fn new(kind: EntityKind, batch_size: usize, pool: WorkerPool) -> Result<Self> {
        if batch_size == 0 {
            return Err(GatewayError::Validation(format!(
                "Batch size for {} must be greater than zero",
                kind
            )));
        }
        Ok(Self { kind, batch_size, pool })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Splits records into `ceil(len / batch_size)` batches, keeping input order.
    pub fn partition(&self, records: Vec<Record>) -> Vec<Vec<Record>> {
        let mut batches = Vec::with_capacity(records.len().div_ceil(self.batch_size));
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            batches.push(records.by_ref().take(self.batch_size).collect());
        }
        batches
    }

    /// Submits one batch, one `add<Kind>` call per record in order.
    ///
    /// Rejected records are collected in the report. A fatal error
    /// (see [`GatewayError::is_fatal`]) stops the batch and is returned.
    pub async fn submit_batch(&self, batch: Vec<Record>) -> Result<BatchReport> {
        let query_name = self.kind.add_query();
        let mut report = BatchReport::default();

        for record in batch {
            let outcome = match record.to_params() {
                Ok(params) => self.pool.execute(query_name.clone(), params).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(error) if error.is_fatal() => {
                    log::error!("Aborting {} batch: {}", self.kind, error);
                    return Err(error);
                }
                Err(error) => {
                    log::error!(
                        "Failed to add {} '{}' (chunk {}) to HelixDB: {}",
                        self.kind,
                        record.url(),
                        record.chunk_number(),
                        error
                    );
                    report.failed.push(RecordFailure { record, error });
                }
            }
        }
        Ok(report)
    }

    /// Partitions `records` and submits the batches, at most `max_concurrent`
    /// at a time. Batches start in input order; once `cancel` fires no new
    /// batch starts and in-flight batches run to completion.
    pub async fn flush(
        &self,
        records: Vec<Record>,
        max_concurrent: usize,
        cancel: &CancellationToken,
    ) -> Result<KindReport> {
        let mut report = KindReport::empty(self.kind);
        if records.is_empty() {
            return Ok(report);
        }

        log::info!("Adding {} {} records to HelixDB.", records.len(), self.kind);
        let batches = self.partition(records);
        report.batches_planned = batches.len();

        let mut outcomes = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                log::debug!("Submitting {} batch {} ({} records)", self.kind, index, batch.len());
                Some(self.submit_batch(batch).await)
            })
            .buffered(max_concurrent.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Some(Ok(batch)) => report.absorb(batch),
                Some(Err(e)) => return Err(e),
                None => report.batches_skipped += 1,
            }
        }

        if report.batches_skipped > 0 {
            log::warn!(
                "{} flush cancelled: {} of {} batches not submitted",
                self.kind,
                report.batches_skipped,
                report.batches_planned
            );
        }
        Ok(report)
    }
}
