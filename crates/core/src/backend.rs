//! Backend abstraction
//!
//! An [`ObjectBackend`] is a bound handle to one bucket of a flat object
//! store. A [`Connector`] knows how to resolve credentials and produce such a
//! handle for a repository. Both are implemented by the SDK crates; nothing in
//! here knows about any particular SDK.

use std::path::Path;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::BackendResult;
use crate::locator::RepositoryLocator;

/// Default upload/download window
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<Timestamp>,
    pub content_type: Option<String>,
}

/// One key returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    /// Set when the backend reported the key as a directory (common prefix)
    pub is_dir: bool,
}

impl ListedObject {
    pub fn object(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_dir: false,
        }
    }

    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_dir: true,
        }
    }
}

/// How listing entries are recognised as directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryInference {
    /// Trust the backend's directory flag, and also a further delimiter
    Markers,
    /// Only a further delimiter in the key makes an entry a directory
    Delimiter,
}

/// What a backend can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Object metadata exposes a last-modified time usable for freshness checks
    pub conditional_get: bool,
    /// Uploads can carry a content type
    pub content_type: bool,
    /// Listing accepts a delimiter and returns only the current level
    pub delimited_listing: bool,
    pub directory_inference: DirectoryInference,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            conditional_get: true,
            content_type: true,
            delimited_listing: true,
            directory_inference: DirectoryInference::Markers,
        }
    }
}

/// Bound handle to a bucket
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities;

    /// Metadata for `key`, `None` if there is no such object
    async fn stat(&self, key: &str) -> BackendResult<Option<ObjectMeta>>;

    async fn exists(&self, key: &str) -> BackendResult<bool>;

    /// Stream the object at `key` into `dest`, returning the byte count
    async fn download(&self, key: &str, dest: &Path) -> BackendResult<u64>;

    /// Stream `source` into a new object at `key`
    async fn upload(
        &self,
        source: &Path,
        key: &str,
        content_type: Option<String>,
    ) -> BackendResult<()>;

    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// All keys starting with `prefix`; with a delimiter, only the current level
    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Vec<ListedObject>>;

    /// Release sessions held by the handle
    async fn shutdown(&self);
}

/// Produces a bound backend for a repository
#[async_trait]
pub trait Connector: Send + Sync {
    type Backend: ObjectBackend + 'static;

    /// Resolve credentials, build a client and bind the repository's bucket.
    ///
    /// A missing bucket must be reported as `BackendError::NotFound`.
    async fn connect(&self, locator: &RepositoryLocator) -> BackendResult<Self::Backend>;

    /// Label used in logs, e.g. `s3`
    fn name(&self) -> &'static str;
}
