use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::app::ports::ObjectStorePort;
use crate::constants::{
    DEFAULT_ERRORS_PREFIX, DEFAULT_PROCESSED_PREFIX, OUTPUT_EXTENSION, REASONS_COLUMN,
    REASON_SEPARATOR,
};
use crate::domain::{ContentDigest, ValidationResult};
use crate::error::IngestError;
use crate::schema::Schema;

/// Where the two partitions land in the destination bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub processed_prefix: String,
    pub errors_prefix: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            processed_prefix: DEFAULT_PROCESSED_PREFIX.to_string(),
            errors_prefix: DEFAULT_ERRORS_PREFIX.to_string(),
        }
    }
}

impl OutputLayout {
    /// `processed/<digest>.csv`; its existence marks the content as done.
    pub fn processed_key(&self, digest: &ContentDigest) -> String {
        join_key(&self.processed_prefix, digest)
    }

    /// `errors/<digest>.csv`
    pub fn errors_key(&self, digest: &ContentDigest) -> String {
        join_key(&self.errors_prefix, digest)
    }
}

fn join_key(prefix: &str, digest: &ContentDigest) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}.{}", digest, OUTPUT_EXTENSION)
    } else {
        format!("{}/{}.{}", prefix, digest, OUTPUT_EXTENSION)
    }
}

/// Both partitions fully serialized, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub valid_csv: Vec<u8>,
    /// `None` when every row was valid.
    pub invalid_csv: Option<Vec<u8>>,
    pub valid_count: usize,
    pub invalid_count: usize,
}

/// Serialize the partitions. Valid rows carry the schema columns; invalid
/// rows add a trailing `reasons` column.
pub fn render_partitions(
    schema: &Schema,
    results: &[ValidationResult],
) -> Result<RenderedOutput, csv::Error> {
    let header: Vec<&str> = schema.column_names().collect();

    let mut valid = WriterBuilder::new().from_writer(Vec::new());
    valid.write_record(&header)?;
    let mut invalid = WriterBuilder::new().from_writer(Vec::new());
    let mut invalid_header = header.clone();
    invalid_header.push(REASONS_COLUMN);
    invalid.write_record(&invalid_header)?;

    let mut valid_count = 0;
    let mut invalid_count = 0;
    for result in results {
        let mut record: Vec<String> = result.row.values.iter().map(|(_, v)| v.render()).collect();
        if result.is_valid() {
            valid.write_record(&record)?;
            valid_count += 1;
        } else {
            record.push(result.reasons().join(REASON_SEPARATOR));
            invalid.write_record(&record)?;
            invalid_count += 1;
        }
    }

    let valid_csv = valid.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    let invalid_csv = if invalid_count > 0 {
        Some(invalid.into_inner().map_err(|e| csv::Error::from(e.into_error()))?)
    } else {
        None
    };

    Ok(RenderedOutput {
        valid_csv,
        invalid_csv,
        valid_count,
        invalid_count,
    })
}

/// Writes rendered partitions to the destination bucket.
pub struct ResultWriter {
    store: Arc<dyn ObjectStorePort>,
    bucket: String,
    layout: OutputLayout,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ObjectStorePort>, bucket: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            layout,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Write the invalid partition if there is one. Returns the key written.
    pub async fn write_invalid(
        &self,
        digest: &ContentDigest,
        rendered: &RenderedOutput,
    ) -> Result<Option<String>, IngestError> {
        let Some(body) = &rendered.invalid_csv else {
            return Ok(None);
        };
        let key = self.layout.errors_key(digest);
        self.put(&key, body.clone()).await?;
        info!(key = %key, rows = rendered.invalid_count, "wrote invalid rows");
        Ok(Some(key))
    }

    /// Write the valid partition, always, since it doubles as the dedup marker.
    pub async fn write_valid(
        &self,
        digest: &ContentDigest,
        rendered: &RenderedOutput,
    ) -> Result<String, IngestError> {
        let key = self.layout.processed_key(digest);
        self.put(&key, rendered.valid_csv.clone()).await?;
        info!(key = %key, rows = rendered.valid_count, "wrote valid rows");
        Ok(key)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), IngestError> {
        self.store
            .put(&self.bucket, key, body)
            .await
            .map_err(|source| IngestError::Write {
                key: key.to_string(),
                source,
            })
    }
}
