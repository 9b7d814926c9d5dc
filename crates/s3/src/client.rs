//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the backend seam from wagon-core.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use jiff::Timestamp;
use tokio::io::AsyncWriteExt;
use wagon_core::config::S3Config;
use wagon_core::staging::write_staged;
use wagon_core::{
    BackendCapabilities, BackendError, BackendResult, Connector, DEFAULT_CHUNK_SIZE,
    DirectoryInference, ListedObject, ObjectBackend, ObjectMeta, RepositoryLocator,
};

/// Creates S3 backends from configuration and the AWS provider chains
#[derive(Debug, Clone)]
pub struct S3Connector {
    config: S3Config,
    chunk_size: usize,
}

impl S3Connector {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    async fn client(&self) -> aws_sdk_s3::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &self.config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) =
            (&self.config.access_key, &self.config.secret_key)
        {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "wagon-static-credentials",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.config.force_path_style)
            .build();

        aws_sdk_s3::Client::from_conf(s3_config)
    }
}

#[async_trait]
impl Connector for S3Connector {
    type Backend = S3Bucket;

    async fn connect(&self, locator: &RepositoryLocator) -> BackendResult<S3Bucket> {
        let client = self.client().await;
        let name = locator.host();

        // The bucket must be one of the caller's own
        let mut token: Option<String> = None;
        let found = loop {
            let mut request = client.list_buckets();
            if let Some(token) = &token {
                request = request.continuation_token(token);
            }
            let response = request.send().await.map_err(classify)?;

            if response.buckets().iter().any(|b| b.name() == Some(name)) {
                break true;
            }
            match response.continuation_token() {
                Some(next) if !next.is_empty() => token = Some(next.to_string()),
                _ => break false,
            }
        };

        if !found {
            return Err(BackendError::NotFound(format!("bucket {name}")));
        }

        tracing::debug!(bucket = name, "Found S3 bucket");
        Ok(S3Bucket {
            client,
            bucket: name.to_string(),
            chunk_size: self.chunk_size,
            conditional_get: self.config.conditional_get,
        })
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

/// One bound S3 bucket
pub struct S3Bucket {
    client: aws_sdk_s3::Client,
    bucket: String,
    chunk_size: usize,
    conditional_get: bool,
}

impl S3Bucket {
    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.client
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn to_timestamp(value: &aws_smithy_types::DateTime) -> Option<Timestamp> {
    Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

/// Classify an SDK failure by error code, then by HTTP status
fn classify<E>(error: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&error).to_string();

    match &error {
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code();
            let status = service_err.raw().status().as_u16();
            match (code, status) {
                (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, 404) => {
                    BackendError::NotFound(message)
                }
                (Some("InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"), _)
                | (_, 401) => BackendError::Credentials(message),
                (Some("AccessDenied" | "AllAccessDisabled"), _) | (_, 403) => {
                    BackendError::PermissionDenied(message)
                }
                _ => BackendError::Service(message),
            }
        }
        SdkError::TimeoutError(_) => {
            BackendError::Io(io::Error::new(io::ErrorKind::TimedOut, message))
        }
        SdkError::DispatchFailure(_) => BackendError::Io(io::Error::other(message)),
        _ => BackendError::Service(message),
    }
}

#[async_trait]
impl ObjectBackend for S3Bucket {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            conditional_get: self.conditional_get,
            content_type: true,
            delimited_listing: true,
            // S3 has no directory objects; common prefixes end in the delimiter
            directory_inference: DirectoryInference::Delimiter,
        }
    }

    async fn stat(&self, key: &str) -> BackendResult<Option<ObjectMeta>> {
        tracing::debug!(bucket = %self.bucket, key, "head_object");
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return match classify(e) {
                    BackendError::NotFound(_) => Ok(None),
                    other => Err(other),
                };
            }
        };

        Ok(Some(ObjectMeta {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            last_modified: response.last_modified().and_then(to_timestamp),
            content_type: response.content_type().map(str::to_string),
        }))
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        Ok(self.stat(key).await?.is_some())
    }

    async fn download(&self, key: &str, dest: &Path) -> BackendResult<u64> {
        tracing::debug!(bucket = %self.bucket, key, "get_object");
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        let mut body = response.body.into_async_read();
        let chunk_size = self.chunk_size;
        write_staged(dest, |file| async move {
            let mut writer = tokio::io::BufWriter::with_capacity(chunk_size, file);
            let bytes = tokio::io::copy(&mut body, &mut writer).await?;
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
        let body = ByteStream::read_from()
            .path(source)
            .buffer_size(self.chunk_size)
            .build()
            .await
            .map_err(|e| BackendError::Io(io::Error::other(e)))?;

        tracing::debug!(bucket = %self.bucket, key, "put_object");
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request.send().await.map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        tracing::debug!(bucket = %self.bucket, key, "delete_object");
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match classify(e) {
                BackendError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Vec<ListedObject>> {
        let mut listed = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(delimiter) = delimiter {
                request = request.delimiter(delimiter.to_string());
            }
            if let Some(token) = &token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(classify)?;

            // Common prefixes are directories
            for common in response.common_prefixes() {
                if let Some(p) = common.prefix() {
                    listed.push(ListedObject::dir(p));
                }
            }
            for object in response.contents() {
                if let Some(key) = object.key() {
                    listed.push(ListedObject::object(key));
                }
            }

            match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(bucket = %self.bucket, prefix, count = listed.len(), "list_objects_v2");
        Ok(listed)
    }

    async fn shutdown(&self) {
        tracing::debug!(bucket = %self.bucket, "Released S3 client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;

    fn service_error(status: u16, code: Option<&str>) -> SdkError<GetObjectError, HttpResponse> {
        let mut meta = ErrorMetadata::builder();
        if let Some(code) = code {
            meta = meta.code(code);
        }
        let raw = HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::empty());
        SdkError::service_error(GetObjectError::generic(meta.build()), raw)
    }

    #[test]
    fn test_classify_by_code_and_status() {
        assert!(matches!(
            classify(service_error(404, None)),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            classify(service_error(400, Some("NoSuchBucket"))),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            classify(service_error(403, Some("AccessDenied"))),
            BackendError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(service_error(403, Some("InvalidAccessKeyId"))),
            BackendError::Credentials(_)
        ));
        assert!(matches!(
            classify(service_error(503, Some("SlowDown"))),
            BackendError::Service(_)
        ));
    }

    #[test]
    fn test_classify_timeout() {
        let error: SdkError<GetObjectError, HttpResponse> = SdkError::timeout_error("deadline");
        match classify(error) {
            BackendError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_conversion() {
        let value = aws_smithy_types::DateTime::from_secs_and_nanos(1_700_000_000, 250_000_000);
        let ts = to_timestamp(&value).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 250_000_000);
    }

    #[test]
    fn test_capabilities_follow_config() {
        let connector = S3Connector::new(S3Config {
            conditional_get: false,
            ..Default::default()
        });
        assert_eq!(connector.name(), "s3");
        assert!(!connector.config.conditional_get);
        assert_eq!(connector.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_common_prefixes_collapse_without_markers() {
        let listed = vec![
            ListedObject::dir("releases/1.1/"),
            ListedObject::object("releases/acme-1.0.jar"),
        ];
        let entries =
            wagon_core::listing::collapse_listing("releases/", &listed, DirectoryInference::Delimiter);
        assert_eq!(entries, vec!["1.1/", "acme-1.0.jar"]);
    }
}
