use async_trait::async_trait;

use crate::error::StoreError;

/// Object store the pipeline reads uploads from and writes results to.
///
/// Calls are awaited one at a time; implementations do not retry.
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;

    /// Store the whole body under `key`, replacing any previous object.
    /// Either the full body becomes visible or nothing does.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}
