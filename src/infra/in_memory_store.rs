use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::ObjectStorePort;
use crate::error::StoreError;

type ObjectKey = (String, String);

/// In-memory object store for development/testing
///
/// Besides the objects themselves it records how many puts were accepted and
/// can be told to fail reads or writes, so callers can be exercised against
/// an unhealthy store.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Vec<u8>>>>,
    puts: Arc<Mutex<usize>>,
    read_failure: Arc<Mutex<Option<String>>>,
    lookup_failure: Arc<Mutex<Option<String>>>,
    write_failures: Arc<Mutex<Vec<String>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a pipeline write.
    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert((bucket.to_string(), key.to_string()), body);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// Keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.lock().unwrap();
        objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }

    /// Make every subsequent `get`/`exists` fail with `message`.
    pub fn fail_reads(&self, message: &str) {
        *self.read_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make only `exists` fail, leaving `get` working.
    pub fn fail_lookups(&self, message: &str) {
        *self.lookup_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Reject writes to keys starting with `prefix`.
    pub fn fail_writes_under(&self, prefix: &str) {
        self.write_failures.lock().unwrap().push(prefix.to_string());
    }

    /// Undo every injected failure.
    pub fn clear_failures(&self) {
        *self.read_failure.lock().unwrap() = None;
        *self.lookup_failure.lock().unwrap() = None;
        self.write_failures.lock().unwrap().clear();
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        rejected_if_set(&self.read_failure)
    }
}

fn rejected_if_set(failure: &Mutex<Option<String>>) -> Result<(), StoreError> {
    match failure.lock().unwrap().as_ref() {
        Some(message) => Err(StoreError::Rejected {
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check_reads()?;
        self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        self.check_reads()?;
        rejected_if_set(&self.lookup_failure)?;
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let rejected = self
            .write_failures
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));
        if rejected {
            return Err(StoreError::Rejected {
                message: format!("writes to {} are disabled", key),
            });
        }

        let size = body.len();
        self.insert(bucket, key, body);
        *self.puts.lock().unwrap() += 1;
        debug!(bucket, key, bytes = size, "stored object");
        Ok(())
    }
}
