//! Google Cloud Storage client implementation
//!
//! Wraps google-cloud-storage and implements the backend seam from wagon-core.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use jiff::Timestamp;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use wagon_core::config::GsConfig;
use wagon_core::staging::write_staged;
use wagon_core::{
    BackendCapabilities, BackendError, BackendResult, Connector, DEFAULT_CHUNK_SIZE,
    DirectoryInference, ListedObject, ObjectBackend, ObjectMeta, RepositoryLocator,
};

/// Creates Cloud Storage backends from application default credentials
#[derive(Debug, Clone)]
pub struct GsConnector {
    config: GsConfig,
    chunk_size: usize,
}

impl GsConnector {
    pub fn new(config: GsConfig) -> Self {
        Self {
            config,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    async fn client(&self) -> BackendResult<Client> {
        if self.config.anonymous {
            return Ok(Client::new(ClientConfig::default()));
        }

        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| BackendError::Credentials(e.to_string()))?;
        Ok(Client::new(config))
    }
}

#[async_trait]
impl Connector for GsConnector {
    type Backend = GsBucket;

    async fn connect(&self, locator: &RepositoryLocator) -> BackendResult<GsBucket> {
        let client = self.client().await?;
        let name = locator.host();

        client
            .get_bucket(&GetBucketRequest {
                bucket: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(classify)?;

        tracing::debug!(bucket = name, "Found Cloud Storage bucket");
        Ok(GsBucket {
            client,
            bucket: name.to_string(),
            chunk_size: self.chunk_size,
        })
    }

    fn name(&self) -> &'static str {
        "gs"
    }
}

/// One bound Cloud Storage bucket
pub struct GsBucket {
    client: Client,
    bucket: String,
    chunk_size: usize,
}

impl GsBucket {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_request(&self, key: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: key.to_string(),
            ..Default::default()
        }
    }
}

fn classify_status(code: u16, message: String) -> BackendError {
    match code {
        404 => BackendError::NotFound(message),
        401 => BackendError::Credentials(message),
        403 => BackendError::PermissionDenied(message),
        _ => BackendError::Service(message),
    }
}

fn classify(error: GcsError) -> BackendError {
    match error {
        GcsError::Response(response) => {
            let message = format!("{}: {}", response.code, response.message);
            classify_status(response.code, message)
        }
        GcsError::HttpClient(e) => BackendError::Io(io::Error::other(e)),
        other => BackendError::Service(other.to_string()),
    }
}

fn nanos_to_timestamp(nanos: i128) -> Option<Timestamp> {
    Timestamp::from_nanosecond(nanos).ok()
}

#[async_trait]
impl ObjectBackend for GsBucket {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            conditional_get: true,
            content_type: true,
            delimited_listing: true,
            directory_inference: DirectoryInference::Markers,
        }
    }

    async fn stat(&self, key: &str) -> BackendResult<Option<ObjectMeta>> {
        tracing::debug!(bucket = %self.bucket, key, "objects.get");
        let object = match self.client.get_object(&self.object_request(key)).await {
            Ok(object) => object,
            Err(e) => {
                return match classify(e) {
                    BackendError::NotFound(_) => Ok(None),
                    other => Err(other),
                };
            }
        };

        Ok(Some(ObjectMeta {
            size: object.size.max(0) as u64,
            last_modified: object
                .updated
                .and_then(|t| nanos_to_timestamp(t.unix_timestamp_nanos())),
            content_type: object.content_type,
        }))
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        Ok(self.stat(key).await?.is_some())
    }

    async fn download(&self, key: &str, dest: &Path) -> BackendResult<u64> {
        tracing::debug!(bucket = %self.bucket, key, "objects.download");
        let stream = self
            .client
            .download_streamed_object(&self.object_request(key), &Range::default())
            .await
            .map_err(classify)?;
        let chunk_size = self.chunk_size;

        write_staged(dest, |file| async move {
            let mut stream = std::pin::pin!(stream);
            let mut writer = tokio::io::BufWriter::with_capacity(chunk_size, file);
            let mut bytes = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(classify)?;
                writer.write_all(&chunk).await?;
                bytes += chunk.len() as u64;
            }
            writer.flush().await?;
            Ok(bytes)
        })
        .await
    }

    async fn upload(
        &self,
        source: &Path,
        key: &str,
        content_type: Option<String>,
    ) -> BackendResult<()> {
        let file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();

        let mut media = Media::new(key.to_string());
        media.content_length = Some(length);
        if let Some(ct) = content_type {
            media.content_type = ct.into();
        }

        tracing::debug!(bucket = %self.bucket, key, length, "objects.insert");
        self.client
            .upload_streamed_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                ReaderStream::with_capacity(file, self.chunk_size),
                &UploadType::Simple(media),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        tracing::debug!(bucket = %self.bucket, key, "objects.delete");
        let result = self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await;

        match result.map_err(classify) {
            Ok(()) | Err(BackendError::NotFound(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Vec<ListedObject>> {
        let mut listed = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: self.bucket.clone(),
                    prefix: Some(prefix.to_string()),
                    delimiter: delimiter.map(String::from),
                    page_token: page_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(classify)?;

            listed.extend(response.prefixes.into_iter().flatten().map(ListedObject::dir));
            listed.extend(
                response
                    .items
                    .into_iter()
                    .flatten()
                    .map(|object| ListedObject::object(object.name)),
            );

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket = %self.bucket, prefix, count = listed.len(), "objects.list");
        Ok(listed)
    }

    async fn shutdown(&self) {
        tracing::debug!(bucket = %self.bucket, "Released Cloud Storage client");
    }
}
