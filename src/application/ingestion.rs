use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::batch_writer::{BatchWriter, KindReport, RecordFailure};
use crate::config::IngestConfig;
use crate::domain::record::{CodeExample, Document, EntityKind, Metadata, Record};
use crate::error::{GatewayError, Result};
use crate::infrastructure::worker_pool::WorkerPool;

/// Parallel columns describing N documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentColumns {
    pub urls: Vec<String>,
    pub chunk_numbers: Vec<i64>,
    pub contents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl DocumentColumns {
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_records(self) -> Result<Vec<Record>> {
        check_lengths(
            EntityKind::Document,
            &[
                ("urls", self.urls.len()),
                ("chunk_numbers", self.chunk_numbers.len()),
                ("contents", self.contents.len()),
                ("metadatas", self.metadatas.len()),
            ],
        )?;
        Ok(self
            .urls
            .into_iter()
            .zip(self.chunk_numbers)
            .zip(self.contents)
            .zip(self.metadatas)
            .map(|(((url, chunk_number), content), metadata)| {
                Record::Document(Document { url, chunk_number, content, metadata })
            })
            .collect())
    }
}

/// Parallel columns describing N code examples.
#[derive(Debug, Clone, Default)]
pub struct CodeExampleColumns {
    pub urls: Vec<String>,
    pub chunk_numbers: Vec<i64>,
    pub code_examples: Vec<String>,
    pub summaries: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl CodeExampleColumns {
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_records(self) -> Result<Vec<Record>> {
        check_lengths(
            EntityKind::CodeExample,
            &[
                ("urls", self.urls.len()),
                ("chunk_numbers", self.chunk_numbers.len()),
                ("code_examples", self.code_examples.len()),
                ("summaries", self.summaries.len()),
                ("metadatas", self.metadatas.len()),
            ],
        )?;
        Ok(self
            .urls
            .into_iter()
            .zip(self.chunk_numbers)
            .zip(self.code_examples)
            .zip(self.summaries)
            .zip(self.metadatas)
            .map(|((((url, chunk_number), content), summary), metadata)| {
                Record::CodeExample(CodeExample { url, chunk_number, content, summary, metadata })
            })
            .collect())
    }
}

fn check_lengths(kind: EntityKind, columns: &[(&str, usize)]) -> Result<()> {
    let expected = columns.first().map_or(0, |(_, len)| *len);
    if columns.iter().all(|(_, len)| *len == expected) {
        return Ok(());
    }
    let shape: Vec<String> = columns
        .iter()
        .map(|(name, len)| format!("{}={}", name, len))
        .collect();
    Err(GatewayError::Validation(format!(
        "{} input columns have mismatched lengths: {}",
        kind,
        shape.join(", ")
    )))
}

/// Aggregated outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionSummary {
    pub run_id: Uuid,
    pub documents: KindReport,
    pub code_examples: KindReport,
    /// Set when cancellation kept at least one batch from being submitted.
    pub cancelled: bool,
}

impl IngestionSummary {
    pub fn total_succeeded(&self) -> usize {
        self.documents.succeeded + self.code_examples.succeeded
    }

    pub fn total_failed(&self) -> usize {
        self.documents.failed.len() + self.code_examples.failed.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.documents.failed.iter().chain(self.code_examples.failed.iter())
    }

    pub fn report(&self, kind: EntityKind) -> &KindReport {
        match kind {
            EntityKind::Document => &self.documents,
            EntityKind::CodeExample => &self.code_examples,
        }
    }
}

/// Drives per-kind batch writers over a shared worker pool.
///
/// Input is fully validated before the first write. Documents and code
/// examples are flushed concurrently; no ordering holds between the two kinds.
pub struct IngestionOrchestrator {
    pool: WorkerPool,
    config: IngestConfig,
}

impl IngestionOrchestrator {
    pub fn new(pool: WorkerPool, config: IngestConfig) -> Self {
        Self { pool, config }
    }

    pub async fn ingest_documents(
        &self,
        columns: DocumentColumns,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        let records = columns.into_records()?;
        self.ingest_records(records, cancel).await
    }

    pub async fn ingest_code_examples(
        &self,
        columns: CodeExampleColumns,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        let records = columns.into_records()?;
        self.ingest_records(records, cancel).await
    }

    /// Ingests both kinds in one run. Both column sets are validated before
    /// anything is written.
    pub async fn ingest(
        &self,
        documents: DocumentColumns,
        code_examples: CodeExampleColumns,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        let mut records = documents.into_records()?;
        records.extend(code_examples.into_records()?);
        self.ingest_records(records, cancel).await
    }

    /// Ingests pre-built records of any kind.
    ///
    /// `Validation` and `Connection` errors end the run with `Err`; rejected
    /// records are counted in the summary instead.
    pub async fn ingest_records(
        &self,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        for record in &records {
            record.validate()?;
        }

        let document_writer = self.writer(EntityKind::Document)?;
        let code_writer = self.writer(EntityKind::CodeExample)?;
        let (documents, code_examples): (Vec<Record>, Vec<Record>) = records
            .into_iter()
            .partition(|r| r.kind() == EntityKind::Document);

        let run_id = Uuid::new_v4();
        log::info!(
            "Ingestion run {} started: {} documents, {} code examples",
            run_id,
            documents.len(),
            code_examples.len()
        );

        let concurrency = self.config.max_concurrent_batches;
        let outcome = futures::future::try_join(
            document_writer.flush(documents, concurrency, cancel),
            code_writer.flush(code_examples, concurrency, cancel),
        )
        .await;

        let (documents, code_examples) = match outcome {
            Ok(reports) => reports,
            Err(e) => {
                log::error!("Ingestion run {} aborted: {}", run_id, e);
                return Err(e);
            }
        };

        let summary = IngestionSummary {
            run_id,
            cancelled: documents.batches_skipped + code_examples.batches_skipped > 0,
            documents,
            code_examples,
        };
        log_summary(&summary);
        Ok(summary)
    }

    fn writer(&self, kind: EntityKind) -> Result<BatchWriter> {
        BatchWriter::new(kind, self.config.batch_size(kind), self.pool.clone())
    }
}

fn log_summary(summary: &IngestionSummary) {
    for report in [&summary.documents, &summary.code_examples] {
        if report.batches_planned == 0 {
            continue;
        }
        log::info!(
            "Run {} {}: {} succeeded, {} failed, {}/{} batches submitted",
            summary.run_id,
            report.kind,
            report.succeeded,
            report.failed.len(),
            report.batches_submitted,
            report.batches_planned
        );
    }
    if summary.total_failed() > 0 {
        log::warn!(
            "Ingestion run {} finished with {} failed records",
            summary.run_id,
            summary.total_failed()
        );
    } else {
        log::info!(
            "Ingestion run {} finished: {} records stored{}",
            summary.run_id,
            summary.total_succeeded(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );
    }
}
