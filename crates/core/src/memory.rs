//! In-memory object store
//!
//! A [`Connector`] whose buckets live in process memory. It counts setups,
//! shutdowns and backend calls, which makes it the reference backend for
//! exercising transport behaviour without a network.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendCapabilities, Connector, ListedObject, ObjectBackend, ObjectMeta};
use crate::error::{BackendError, BackendResult};
use crate::locator::RepositoryLocator;

/// Call counters shared between a connector and the backends it creates
#[derive(Debug, Default)]
pub struct Counters {
    pub setups: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub calls: AtomicUsize,
}

impl Counters {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub last_modified: Timestamp,
}

/// One bucket's objects, keyed by object key
#[derive(Debug, Default)]
pub struct MemoryBucket {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryBucket {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.insert_at(key, data, Timestamp::now());
    }

    pub fn insert_at(&self, key: impl Into<String>, data: impl Into<Vec<u8>>, at: Timestamp) {
        self.lock().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: None,
                last_modified: at,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// Connector over in-memory buckets
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    buckets: HashMap<String, Arc<MemoryBucket>>,
    capabilities: BackendCapabilities,
    setup_delay: Option<Duration>,
    setup_failure: Option<String>,
    counters: Arc<Counters>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            capabilities: BackendCapabilities::default(),
            setup_delay: None,
            setup_failure: None,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_bucket(mut self, name: impl Into<String>) -> Self {
        self.buckets.entry(name.into()).or_default();
        self
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make every setup take at least `delay`
    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = Some(delay);
        self
    }

    /// Make every setup fail as if the credential chain came up empty
    pub fn with_setup_failure(mut self, message: impl Into<String>) -> Self {
        self.setup_failure = Some(message.into());
        self
    }

    pub fn bucket(&self, name: &str) -> Option<Arc<MemoryBucket>> {
        self.buckets.get(name).cloned()
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Backend = MemoryBackend;

    async fn connect(&self, locator: &RepositoryLocator) -> BackendResult<MemoryBackend> {
        self.counters.setups.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.setup_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.setup_failure {
            return Err(BackendError::Credentials(message.clone()));
        }

        let bucket = self
            .buckets
            .get(locator.host())
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("bucket {}", locator.host())))?;

        Ok(MemoryBackend {
            bucket,
            capabilities: self.capabilities,
            counters: self.counters.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Bound in-memory bucket
#[derive(Debug)]
pub struct MemoryBackend {
    bucket: Arc<MemoryBucket>,
    capabilities: BackendCapabilities,
    counters: Arc<Counters>,
}

impl MemoryBackend {
    fn count(&self) {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    async fn stat(&self, key: &str) -> BackendResult<Option<ObjectMeta>> {
        self.count();
        Ok(self.bucket.get(key).map(|object| ObjectMeta {
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            content_type: object.content_type,
        }))
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        self.count();
        Ok(self.bucket.get(key).is_some())
    }

    async fn download(&self, key: &str, dest: &Path) -> BackendResult<u64> {
        self.count();
        let object = self
            .bucket
            .get(key)
            .ok_or_else(|| BackendError::NotFound(key.to_string()))?;
        crate::staging::write_staged(dest, |mut file| async move {
            file.write_all(&object.data).await?;
            file.flush().await?;
            Ok(object.data.len() as u64)
        })
        .await
    }

    async fn upload(
        &self,
        source: &Path,
        key: &str,
        content_type: Option<String>,
    ) -> BackendResult<()> {
        self.count();
        let data = tokio::fs::read(source).await?;
        self.bucket.lock().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type,
                last_modified: Timestamp::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.count();
        self.bucket.lock().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Vec<ListedObject>> {
        self.count();
        let keys: Vec<String> = self
            .bucket
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        let Some(delimiter) = delimiter else {
            return Ok(keys.into_iter().map(ListedObject::object).collect());
        };

        // Group deeper keys into common prefixes, as S3 and GCS do
        let mut common = BTreeSet::new();
        let mut listed = Vec::new();
        for key in keys {
            match key[prefix.len()..].find(delimiter) {
                Some(at) => {
                    common.insert(key[..prefix.len() + at + delimiter.len_utf8()].to_string());
                }
                None => listed.push(ListedObject::object(key)),
            }
        }
        listed.extend(common.into_iter().map(ListedObject::dir));
        Ok(listed)
    }

    async fn shutdown(&self) {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
