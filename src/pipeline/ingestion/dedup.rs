use std::sync::Arc;
use tracing::debug;

use crate::app::ports::ObjectStorePort;
use crate::domain::ContentDigest;
use crate::error::IngestError;
use crate::pipeline::output::OutputLayout;

/// Answers "has this content already been processed?" by looking for the
/// processed artifact keyed by its digest.
pub struct DedupChecker {
    store: Arc<dyn ObjectStorePort>,
    bucket: String,
    layout: OutputLayout,
}

impl DedupChecker {
    pub fn new(store: Arc<dyn ObjectStorePort>, bucket: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            layout,
        }
    }

    /// A store failure is an error, never a silent "not processed".
    pub async fn already_processed(&self, digest: &ContentDigest) -> Result<bool, IngestError> {
        let key = self.layout.processed_key(digest);
        let exists = self
            .store
            .exists(&self.bucket, &key)
            .await
            .map_err(|source| IngestError::Fetch {
                bucket: self.bucket.clone(),
                key: key.clone(),
                source,
            })?;
        debug!(%digest, key = %key, exists, "dedup check");
        Ok(exists)
    }
}
