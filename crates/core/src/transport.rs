//! Transfer operations
//!
//! [`Transport`] is the operation surface every repository variant offers.
//! [`ObjectStoreTransport`] implements it on top of any [`Connector`].

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::backend::{Connector, ObjectBackend};
use crate::connection::ConnectionManager;
use crate::content_type::ContentTypeProbe;
use crate::error::{BackendError, Error, Phase, Result, Translate};
use crate::events::{EventKind, EventSupport, RequestType, Resource, TransferListener};
use crate::key::ObjectKeyResolver;
use crate::listing::collapse_listing;
use crate::locator::{DELIMITER, RepositoryLocator};

/// Session-debug notice sent when a conditional get is served unconditionally
pub const CONDITIONAL_GET_UNSUPPORTED: &str =
    "getIfNewer not supported - performing an unconditional get";

/// Repository transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Label of the variant, e.g. `s3`
    fn variant(&self) -> &'static str;

    fn locator(&self) -> &RepositoryLocator;

    fn add_listener(&self, listener: Arc<dyn TransferListener>);

    /// Bind the backend now instead of on first use
    async fn open(&self) -> Result<()>;

    async fn close(&self);

    /// Download resource `name` into `dest`
    async fn get(&self, name: &str, dest: &Path) -> Result<()>;

    /// Download `name` only if it changed after `since`. Returns whether it
    /// was downloaded.
    async fn get_if_newer(&self, name: &str, dest: &Path, since: Timestamp) -> Result<bool>;

    /// Upload the local file `source` as resource `name`
    async fn put(&self, source: &Path, name: &str) -> Result<()>;

    /// Upload a local directory tree under `name`
    async fn put_directory(&self, source: &Path, name: &str) -> Result<()>;

    async fn resource_exists(&self, name: &str) -> Result<bool>;

    /// Entries of directory `dir`, subdirectories suffixed with `/`
    async fn file_list(&self, dir: &str) -> Result<Vec<String>>;

    fn supports_directory_copy(&self) -> bool;
}

/// Local source check shared by all variants
pub(crate) async fn source_resource(source: &Path, name: &str) -> Result<Resource> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(Error::NotFound(source.display().to_string())),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Err(Error::NotFound(source.display().to_string()));
        }
        Err(e) => {
            let context = source.display().to_string();
            return Err(BackendError::Io(e).translate(Phase::Transfer, context));
        }
    };

    let mut resource = Resource::new(name);
    resource.content_length = Some(metadata.len());
    resource.last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| Timestamp::try_from(t).ok());
    Ok(resource)
}

pub(crate) async fn create_parent_dirs(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            BackendError::Io(e).translate(Phase::Transfer, parent.display().to_string())
        })?;
    }
    Ok(())
}

/// Transport over a flat object store
pub struct ObjectStoreTransport<C: Connector> {
    connection: ConnectionManager<C>,
    keys: ObjectKeyResolver,
    probe: ContentTypeProbe,
    events: EventSupport,
}

impl<C: Connector> ObjectStoreTransport<C> {
    pub fn new(connector: C, locator: RepositoryLocator) -> Self {
        let keys = ObjectKeyResolver::new(&locator);
        Self {
            connection: ConnectionManager::new(connector, locator),
            keys,
            probe: ContentTypeProbe::default(),
            events: EventSupport::default(),
        }
    }

    /// Content-type detectors consulted on upload
    pub fn with_probe(mut self, probe: ContentTypeProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn keys(&self) -> &ObjectKeyResolver {
        &self.keys
    }

    async fn fetch(&self, resource: &Resource, dest: &Path) -> Result<()> {
        create_parent_dirs(dest).await?;
        self.events
            .fire(EventKind::Started, RequestType::Get, resource, dest);

        let key = self.keys.key(&resource.name);
        let backend = self.connection.handle().await?;

        if !backend
            .exists(&key)
            .await
            .translate(Phase::Transfer, || key.clone())?
        {
            return Err(Error::NotFound(key));
        }

        tracing::debug!(key = %key, dest = %dest.display(), "Downloading object");
        let bytes = backend
            .download(&key, dest)
            .await
            .translate(Phase::Transfer, || format!("{key} -> {}", dest.display()))?;
        tracing::debug!(key = %key, bytes, "Download complete");
        Ok(())
    }

    async fn store(&self, resource: &Resource, source: &Path) -> Result<()> {
        self.events
            .fire(EventKind::Started, RequestType::Put, resource, source);

        let key = self.keys.key(&resource.name);
        let backend = self.connection.handle().await?;
        let context = || format!("{} -> {key}", source.display());

        backend
            .delete(&key)
            .await
            .translate(Phase::Transfer, context)?;

        let content_type = if backend.capabilities().content_type {
            self.probe.probe(source)
        } else {
            None
        };

        tracing::debug!(
            key = %key,
            source = %source.display(),
            content_type = content_type.as_deref().unwrap_or("-"),
            "Uploading object"
        );
        backend
            .upload(source, &key, content_type)
            .await
            .translate(Phase::Transfer, context)
    }
}

#[async_trait]
impl<C: Connector> Transport for ObjectStoreTransport<C> {
    fn variant(&self) -> &'static str {
        self.connection.connector().name()
    }

    fn locator(&self) -> &RepositoryLocator {
        self.connection.locator()
    }

    fn add_listener(&self, listener: Arc<dyn TransferListener>) {
        self.events.add_listener(listener);
    }

    async fn open(&self) -> Result<()> {
        self.connection.open().await.map(|_| ())
    }

    async fn close(&self) {
        self.connection.close().await;
    }

    async fn get(&self, name: &str, dest: &Path) -> Result<()> {
        let resource = Resource::new(name);
        self.events
            .fire(EventKind::Initiated, RequestType::Get, &resource, dest);

        match self.fetch(&resource, dest).await {
            Ok(()) => {
                self.events
                    .fire(EventKind::Completed, RequestType::Get, &resource, dest);
                Ok(())
            }
            Err(e) => {
                self.events
                    .fire_error(RequestType::Get, &resource, dest, &e);
                Err(e)
            }
        }
    }

    async fn get_if_newer(&self, name: &str, dest: &Path, since: Timestamp) -> Result<bool> {
        let backend = self.connection.handle().await?;

        if !backend.capabilities().conditional_get {
            tracing::warn!(
                repository = %self.locator(),
                resource = name,
                "Conditional get unsupported, downloading unconditionally"
            );
            self.events.session_debug(CONDITIONAL_GET_UNSUPPORTED);
            self.get(name, dest).await?;
            return Ok(true);
        }

        let key = self.keys.key(name);
        let Some(meta) = backend
            .stat(&key)
            .await
            .translate(Phase::Transfer, || key.clone())?
        else {
            return Ok(false);
        };

        // Without a modification time the object is not newer
        if meta.last_modified.is_some_and(|modified| modified > since) {
            self.get(name, dest).await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn put(&self, source: &Path, name: &str) -> Result<()> {
        let resource = source_resource(source, name).await?;
        self.events
            .fire(EventKind::Initiated, RequestType::Put, &resource, source);

        match self.store(&resource, source).await {
            Ok(()) => {
                self.events
                    .fire(EventKind::Completed, RequestType::Put, &resource, source);
                Ok(())
            }
            Err(e) => {
                self.events
                    .fire_error(RequestType::Put, &resource, source, &e);
                Err(e)
            }
        }
    }

    async fn put_directory(&self, source: &Path, name: &str) -> Result<()> {
        Err(Error::Unsupported(format!(
            "{} transport cannot copy directory {} to {name}",
            self.variant(),
            source.display()
        )))
    }

    async fn resource_exists(&self, name: &str) -> Result<bool> {
        let key = self.keys.key(name);
        let backend = self.connection.handle().await?;
        backend
            .exists(&key)
            .await
            .translate(Phase::Transfer, || key.clone())
    }

    async fn file_list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = self.keys.dir_key(dir);
        let backend = self.connection.handle().await?;
        let capabilities = backend.capabilities();

        let delimiter = capabilities.delimited_listing.then_some(DELIMITER);
        let objects = backend
            .list(&prefix, delimiter)
            .await
            .translate(Phase::Transfer, || prefix.clone())?;

        tracing::debug!(prefix = %prefix, objects = objects.len(), "Listed keys");
        Ok(collapse_listing(
            &prefix,
            &objects,
            capabilities.directory_inference,
        ))
    }

    fn supports_directory_copy(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCapabilities, DirectoryInference, MockObjectBackend, ObjectMeta};
    use crate::connection::ConnectionPhase;
    use crate::content_type::{ContentTypeDetector, ExtensionDetector};
    use crate::error::BackendResult;
    use crate::events::RecordingListener;
    use crate::memory::MemoryConnector;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    fn transport(connector: MemoryConnector) -> ObjectStoreTransport<MemoryConnector> {
        let locator = RepositoryLocator::parse("mem://artifacts/releases/").unwrap();
        let detectors: Vec<Arc<dyn ContentTypeDetector>> = vec![Arc::new(ExtensionDetector)];
        ObjectStoreTransport::new(connector, locator).with_probe(ContentTypeProbe::new(detectors))
    }

    struct MockConnector(Mutex<Option<MockObjectBackend>>);

    #[async_trait]
    impl Connector for MockConnector {
        type Backend = MockObjectBackend;

        async fn connect(&self, _: &RepositoryLocator) -> BackendResult<MockObjectBackend> {
            Ok(self.0.lock().unwrap().take().expect("connected twice"))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let bucket = connector.bucket("artifacts").unwrap();
        let transport = transport(connector);
        let dir = tempfile::tempdir().unwrap();

        let source = dir.path().join("acme-1.0.pom");
        std::fs::write(&source, b"<project/>").unwrap();
        transport.put(&source, "com/acme/1.0/acme-1.0.pom").await.unwrap();

        let stored = bucket.get("releases/com/acme/1.0/acme-1.0.pom").unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("application/xml"));

        let dest = dir.path().join("out/nested/acme.pom");
        transport.get("com/acme/1.0/acme-1.0.pom", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"<project/>");
        assert!(
            transport
                .resource_exists("com/acme/1.0/acme-1.0.pom")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_put_missing_source_makes_no_backend_calls() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let counters = connector.counters();
        let transport = transport(connector);

        let result = transport
            .put(Path::new("/definitely/not/here.jar"), "x.jar")
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(counters.calls(), 0);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 0);
        assert_eq!(transport.connection().phase(), ConnectionPhase::Unbound);
    }

    #[tokio::test]
    async fn test_put_missing_source_never_touches_backend() {
        // No expectations: any call on the mock panics
        let backend = MockObjectBackend::new();
        let connector = MockConnector(Mutex::new(Some(backend)));
        let locator = RepositoryLocator::parse("s3://bucket/repo").unwrap();
        let transport = ObjectStoreTransport::new(connector, locator);

        let dir = tempfile::tempdir().unwrap();
        let result = transport.put(&dir.path().join("gone.jar"), "gone.jar").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_deletes_before_upload() {
        let mut backend = MockObjectBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_capabilities()
            .returning(BackendCapabilities::default);
        backend
            .expect_delete()
            .withf(|key| key.to_string() == "repo/a.jar")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_upload()
            .withf(|_, key, _| key.to_string() == "repo/a.jar")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let connector = MockConnector(Mutex::new(Some(backend)));
        let locator = RepositoryLocator::parse("s3://bucket/repo").unwrap();
        let transport = ObjectStoreTransport::new(connector, locator);

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jar");
        std::fs::write(&source, b"PK").unwrap();
        transport.put(&source, "a.jar").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_failure_is_transfer_error_with_context() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_capabilities()
            .returning(BackendCapabilities::default);
        backend.expect_delete().returning(|_| Ok(()));
        backend
            .expect_upload()
            .returning(|_, _, _| Err(BackendError::Service("SlowDown".into())));

        let connector = MockConnector(Mutex::new(Some(backend)));
        let locator = RepositoryLocator::parse("s3://bucket/repo").unwrap();
        let transport = ObjectStoreTransport::new(connector, locator);
        let listener = Arc::new(RecordingListener::default());
        transport.add_listener(listener.clone());

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jar");
        std::fs::write(&source, b"PK").unwrap();

        match transport.put(&source, "a.jar").await {
            Err(Error::Transfer { context, source: Some(_) }) => {
                assert!(context.ends_with("-> repo/a.jar"), "{context}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            listener.kinds(),
            vec![
                (RequestType::Put, EventKind::Initiated),
                (RequestType::Put, EventKind::Started),
                (RequestType::Put, EventKind::Error),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_missing_resource_is_not_found() {
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        let listener = Arc::new(RecordingListener::default());
        transport.add_listener(listener.clone());
        let dir = tempfile::tempdir().unwrap();

        match transport.get("nope.jar", &dir.path().join("nope.jar")).await {
            Err(Error::NotFound(key)) => assert_eq!(key, "releases/nope.jar"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            listener.kinds(),
            vec![
                (RequestType::Get, EventKind::Initiated),
                (RequestType::Get, EventKind::Started),
                (RequestType::Get, EventKind::Error),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_order_and_put_metadata() {
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        let listener = Arc::new(RecordingListener::default());
        transport.add_listener(listener.clone());
        let dir = tempfile::tempdir().unwrap();

        let source = dir.path().join("a.jar");
        std::fs::write(&source, b"12345").unwrap();
        transport.put(&source, "a.jar").await.unwrap();
        transport.get("a.jar", &dir.path().join("b.jar")).await.unwrap();

        assert_eq!(
            listener.kinds(),
            vec![
                (RequestType::Put, EventKind::Initiated),
                (RequestType::Put, EventKind::Started),
                (RequestType::Put, EventKind::Completed),
                (RequestType::Get, EventKind::Initiated),
                (RequestType::Get, EventKind::Started),
                (RequestType::Get, EventKind::Completed),
            ]
        );
        let initiated = &listener.events()[0];
        assert_eq!(initiated.resource.content_length, Some(5));
        assert!(initiated.resource.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_get_if_newer() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let bucket = connector.bucket("artifacts").unwrap();
        let transport = transport(connector);
        let dir = tempfile::tempdir().unwrap();

        let modified = Timestamp::from_second(1_600_000_000).unwrap();
        bucket.insert_at("releases/a.jar", "new", modified);

        let later = Timestamp::from_second(1_700_000_000).unwrap();
        let dest = dir.path().join("stale.jar");
        assert!(!transport.get_if_newer("a.jar", &dest, later).await.unwrap());
        assert!(!dest.exists());

        let earlier = Timestamp::from_second(1_500_000_000).unwrap();
        let dest = dir.path().join("fresh.jar");
        assert!(transport.get_if_newer("a.jar", &dest, earlier).await.unwrap());
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");

        // Equal is not newer
        assert!(!transport.get_if_newer("a.jar", &dest, modified).await.unwrap());

        assert!(
            !transport
                .get_if_newer("missing.jar", &dir.path().join("m.jar"), earlier)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_if_newer_without_modification_time() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_capabilities()
            .returning(BackendCapabilities::default);
        backend.expect_stat().times(1).returning(|_| {
            Ok(Some(ObjectMeta {
                size: 3,
                last_modified: None,
                content_type: None,
            }))
        });
        backend.expect_exists().never();
        backend.expect_download().never();

        let connector = MockConnector(Mutex::new(Some(backend)));
        let locator = RepositoryLocator::parse("s3://bucket/repo").unwrap();
        let transport = ObjectStoreTransport::new(connector, locator);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");
        let fetched = transport
            .get_if_newer("a.jar", &dest, Timestamp::now())
            .await
            .unwrap();

        assert!(!fetched);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_put_source_directory_is_not_found() {
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            transport.put(dir.path(), "a.jar").await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(transport.connection().phase(), ConnectionPhase::Unbound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_put_unreadable_source_is_transfer_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("a.jar"), b"PK").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can stat through the mode bits
        let readable = std::fs::metadata(locked.join("a.jar")).is_ok();
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        let result = transport.put(&locked.join("a.jar"), "a.jar").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        if !readable {
            assert!(matches!(result, Err(Error::Transfer { source: Some(_), .. })));
        }
    }

    #[tokio::test]
    async fn test_get_if_newer_degrades_without_conditional_get() {
        let connector = MemoryConnector::new()
            .with_bucket("artifacts")
            .with_capabilities(BackendCapabilities {
                conditional_get: false,
                ..Default::default()
            });
        let bucket = connector.bucket("artifacts").unwrap();
        bucket.insert_at("releases/a.jar", "x", Timestamp::from_second(0).unwrap());
        let transport = transport(connector);
        let listener = Arc::new(RecordingListener::default());
        transport.add_listener(listener.clone());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");
        let fetched = transport
            .get_if_newer("a.jar", &dest, Timestamp::now())
            .await
            .unwrap();

        assert!(fetched);
        assert!(dest.exists());
        assert_eq!(listener.debug_messages(), vec![CONDITIONAL_GET_UNSUPPORTED]);
    }

    #[tokio::test]
    async fn test_file_list_collapses_directories() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let bucket = connector.bucket("artifacts").unwrap();
        for key in [
            "releases/README",
            "releases/com/acme/1.0/acme-1.0.jar",
            "releases/com/acme/1.0/acme-1.0.pom",
            "releases/com/acme/maven-metadata.xml",
            "snapshots/com/acme/x.jar",
        ] {
            bucket.insert(key, "");
        }
        let transport = transport(connector);

        assert_eq!(transport.file_list("").await.unwrap(), vec!["README", "com/"]);
        assert_eq!(
            transport.file_list("/com/acme/").await.unwrap(),
            vec!["1.0/", "maven-metadata.xml"]
        );
        assert_eq!(
            transport.file_list("com/acme/1.0").await.unwrap(),
            vec!["acme-1.0.jar", "acme-1.0.pom"]
        );
        assert!(transport.file_list("org").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_list_without_delimiter_support() {
        let connector = MemoryConnector::new()
            .with_bucket("artifacts")
            .with_capabilities(BackendCapabilities {
                delimited_listing: false,
                directory_inference: DirectoryInference::Delimiter,
                ..Default::default()
            });
        let bucket = connector.bucket("artifacts").unwrap();
        bucket.insert("releases/a/x", "");
        bucket.insert("releases/a/y/z", "");
        let transport = transport(connector);

        assert_eq!(transport.file_list("a").await.unwrap(), vec!["x", "y/"]);
    }

    #[tokio::test]
    async fn test_put_directory_is_unsupported() {
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        assert!(!transport.supports_directory_copy());
        let result = transport.put_directory(Path::new("."), "site").await;
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let transport = transport(MemoryConnector::new().with_bucket("artifacts"));
        transport.open().await.unwrap();
        transport.close().await;
        assert!(matches!(
            transport.resource_exists("a.jar").await,
            Err(Error::Transfer { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_bucket_on_first_operation() {
        let transport = transport(MemoryConnector::new());
        match transport.resource_exists("a.jar").await {
            Err(Error::NotFound(ctx)) => assert_eq!(ctx, "mem://artifacts/releases/"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
