use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::ObjectStorePort;
use crate::domain::{ContentDigest, IngestSummary};
use crate::error::{IngestError, Stage, StageError};
use crate::metrics::IngestMetrics;
use crate::pipeline::ingestion::{fetch_raw_file, DedupChecker};
use crate::pipeline::output::{render_partitions, OutputLayout, ResultWriter};
use crate::pipeline::processing::normalize::{Normalizer, SchemaNormalizer};
use crate::pipeline::processing::parser::{CsvParser, TableParser};
use crate::pipeline::processing::validate::{SchemaValidator, Validator};
use crate::schema::Schema;

/// Where uploads come from and where results go.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub layout: OutputLayout,
}

/// Use case for ingesting one uploaded CSV file end to end
///
/// fetch → hash → dedup check → parse → normalize → validate → write invalid
/// → write valid. Store calls are awaited one at a time; the first failing
/// stage aborts the run.
pub struct IngestUseCase {
    store: Arc<dyn ObjectStorePort>,
    schema: Arc<Schema>,
    source_bucket: String,
    parser: Box<dyn TableParser + Send + Sync>,
    normalizer: Box<dyn Normalizer + Send + Sync>,
    validator: Box<dyn Validator + Send + Sync>,
    dedup: DedupChecker,
    writer: ResultWriter,
}

impl IngestUseCase {
    pub fn new(store: Arc<dyn ObjectStorePort>, schema: Arc<Schema>, settings: IngestSettings) -> Self {
        let dedup = DedupChecker::new(
            store.clone(),
            settings.destination_bucket.clone(),
            settings.layout.clone(),
        );
        let writer = ResultWriter::new(store.clone(), settings.destination_bucket, settings.layout);
        Self {
            normalizer: Box::new(SchemaNormalizer::new(schema.clone())),
            validator: Box::new(SchemaValidator::new(schema.clone())),
            parser: Box::new(CsvParser::default()),
            source_bucket: settings.source_bucket,
            store,
            schema,
            dedup,
            writer,
        }
    }

    /// Replace the default comma-separated parser.
    pub fn with_parser(mut self, parser: Box<dyn TableParser + Send + Sync>) -> Self {
        self.parser = parser;
        self
    }

    /// Ingest `key` from the configured source bucket.
    pub async fn run(&self, key: &str) -> Result<IngestSummary, StageError> {
        self.run_from(&self.source_bucket, key).await
    }

    /// Ingest `bucket/key`. Safe to call repeatedly: content that was already
    /// processed comes back as a skipped summary with no writes.
    pub async fn run_from(&self, bucket: &str, key: &str) -> Result<IngestSummary, StageError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("ingest", run_id = %run_id, bucket, key);
        let started = Instant::now();

        async move {
            match self.execute(run_id, bucket, key, started).await {
                Ok(summary) => {
                    IngestMetrics::record_summary(&summary, started.elapsed());
                    info!(
                        digest = %summary.digest,
                        total_rows = summary.total_rows,
                        valid = summary.valid_count,
                        invalid = summary.invalid_count,
                        skipped = summary.skipped,
                        elapsed_ms = summary.elapsed_ms,
                        "ingest finished"
                    );
                    Ok(summary)
                }
                Err(e) => {
                    IngestMetrics::record_stage_failure(e.stage, started.elapsed());
                    error!(stage = %e.stage, error = %e.source, "ingest failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: String,
        bucket: &str,
        key: &str,
        started: Instant,
    ) -> Result<IngestSummary, StageError> {
        let raw = fetch_raw_file(self.store.as_ref(), bucket, key)
            .await
            .map_err(|e| StageError::new(Stage::Fetch, e))?;
        info!(bytes = raw.len(), "fetched upload");

        let digest = raw.digest();
        let mut summary = IngestSummary {
            run_id,
            source_key: key.to_string(),
            digest: digest.clone(),
            total_rows: 0,
            valid_count: 0,
            invalid_count: 0,
            skipped: false,
            output_paths: Vec::new(),
            elapsed_ms: 0,
        };

        if self
            .dedup
            .already_processed(&digest)
            .await
            .map_err(|e| StageError::new(Stage::DedupCheck, e))?
        {
            info!(%digest, "content already processed, skipping");
            summary.skipped = true;
            summary.elapsed_ms = elapsed_ms(started);
            return Ok(summary);
        }

        let table = self
            .parser
            .parse(&raw.bytes)
            .map_err(|e| StageError::new(Stage::Parse, e))?;
        summary.total_rows = table.row_count();
        info!(%digest, rows = table.row_count(), columns = table.headers.len(), "parsed upload");

        let normalized = self.normalizer.normalize_all(&table.rows);
        let results = self.validator.validate_all(normalized);

        // Everything is serialized before the first write
        let rendered = render_partitions(&self.schema, &results)
            .map_err(|e| self.serialize_error(&digest, e))?;
        summary.valid_count = rendered.valid_count;
        summary.invalid_count = rendered.invalid_count;
        if rendered.invalid_count > 0 {
            warn!(%digest, invalid = rendered.invalid_count, "rows failed validation");
        }

        if let Some(errors_key) = self
            .writer
            .write_invalid(&digest, &rendered)
            .await
            .map_err(|e| StageError::new(Stage::WriteInvalid, e))?
        {
            summary.output_paths.push(errors_key);
        }
        let processed_key = self
            .writer
            .write_valid(&digest, &rendered)
            .await
            .map_err(|e| StageError::new(Stage::WriteValid, e))?;
        summary.output_paths.push(processed_key);

        summary.elapsed_ms = elapsed_ms(started);
        Ok(summary)
    }

    fn serialize_error(&self, digest: &ContentDigest, err: csv::Error) -> StageError {
        StageError::new(
            Stage::Serialize,
            IngestError::Write {
                key: self.writer.layout().processed_key(digest),
                source: err.into(),
            },
        )
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
