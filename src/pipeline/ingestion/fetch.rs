use tracing::debug;

use crate::app::ports::ObjectStorePort;
use crate::domain::RawFile;
use crate::error::{IngestError, Result};

/// Read the whole object into memory.
pub async fn fetch_raw_file(
    store: &dyn ObjectStorePort,
    bucket: &str,
    key: &str,
) -> Result<RawFile> {
    let bytes = store
        .get(bucket, key)
        .await
        .map_err(|source| IngestError::Fetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        })?;
    debug!(bucket, key, bytes = bytes.len(), "fetched object");
    Ok(RawFile::new(bucket, key, bytes))
}
