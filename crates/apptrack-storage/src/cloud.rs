//! Cloud object store backends (GCS and S3) built on `object_store`.
//!
//! Both providers implement `ObjectStore + Signer`, so a single generic client
//! serves them. The store handle is built once at startup; bucket resolution
//! only fails when no default bucket was configured.

use crate::signed_url::SignedUrl;
use crate::traits::{Bucket, ObjectWriter, StorageError, StorageResult, StoreClient};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use http::Method;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::ObjectStoreExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[cfg(feature = "storage-s3")]
use object_store::aws::{AmazonS3, AmazonS3Builder};
#[cfg(feature = "storage-gcs")]
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};

/// Storage client over any signing-capable object store
pub struct ObjectStoreClient<S> {
    backend: StorageBackend,
    bucket: Option<Arc<ObjectStoreBucket<S>>>,
}

impl<S> ObjectStoreClient<S>
where
    S: object_store::ObjectStore + Signer + 'static,
{
    /// Client whose default bucket is `bucket`, served by `store`.
    pub fn new(backend: StorageBackend, bucket: impl Into<String>, store: S) -> Self {
        Self {
            backend,
            bucket: Some(Arc::new(ObjectStoreBucket {
                name: bucket.into(),
                store: Arc::new(store),
            })),
        }
    }

    /// Client with no default bucket; every resolution fails.
    pub fn without_default_bucket(backend: StorageBackend) -> Self {
        Self {
            backend,
            bucket: None,
        }
    }
}

#[async_trait]
impl<S> StoreClient for ObjectStoreClient<S>
where
    S: object_store::ObjectStore + Signer + 'static,
{
    async fn default_bucket(&self) -> StorageResult<Arc<dyn Bucket>> {
        let bucket = self.bucket.clone().ok_or(StorageError::NoDefaultBucket)?;
        Ok(bucket as Arc<dyn Bucket>)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}

pub struct ObjectStoreBucket<S> {
    name: String,
    store: Arc<S>,
}

fn map_store_error(key: &str, err: ObjectStoreError) -> StorageError {
    match err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => StorageError::BackendError(other.to_string()),
    }
}

/// Signing instant and lifetime a presigned URL carries in its query
/// (`X-Amz-Date`/`X-Amz-Expires` or `X-Goog-Date`/`X-Goog-Expires`).
fn signed_window(url: &url::Url) -> Option<(DateTime<Utc>, Duration)> {
    let mut date = None;
    let mut expires = None;

    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "X-Amz-Date" | "X-Goog-Date" => {
                date = NaiveDateTime::parse_from_str(&value, "%Y%m%dT%H%M%SZ")
                    .ok()
                    .map(|d| d.and_utc());
            }
            "X-Amz-Expires" | "X-Goog-Expires" => {
                expires = value.parse::<u64>().ok().map(Duration::from_secs);
            }
            _ => {}
        }
    }

    Some((date?, expires?))
}

#[async_trait]
impl<S> Bucket for ObjectStoreBucket<S>
where
    S: object_store::ObjectStore + Signer + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn writer(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>> {
        let store: Arc<dyn object_store::ObjectStore> = self.store.clone();
        let location = Path::from(key.to_string());

        Ok(Box::new(ObjectStoreWriter {
            inner: BufWriter::new(store, location),
        }))
    }

    async fn signed_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> StorageResult<SignedUrl> {
        let location = Path::from(key.to_string());

        let url = self
            .store
            .signed_url(method.clone(), &location, expires_in)
            .await
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;

        let (issued_at, ttl) = signed_window(&url).ok_or_else(|| {
            StorageError::SigningFailed("Signed URL carries no signing date or expiry".to_string())
        })?;

        Ok(SignedUrl::new(url.to_string(), method, issued_at, ttl))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Path::from(key.to_string());
        self.store
            .delete(&location)
            .await
            .map_err(|e| map_store_error(key, e))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}

/// Buffers writes and uploads on close: a single PUT for small objects, a
/// multipart upload once the buffer exceeds its capacity.
struct ObjectStoreWriter {
    inner: BufWriter,
}

#[async_trait]
impl ObjectWriter for ObjectStoreWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        self.inner
            .write_all(data)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    async fn close(mut self: Box<Self>) -> StorageResult<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }
}

/// Build a Google Cloud Storage handle for `bucket`.
///
/// `credentials_base64` is a base64-encoded service account JSON; when absent
/// the builder falls back to the `GOOGLE_*` environment variables and
/// application default credentials.
#[cfg(feature = "storage-gcs")]
pub fn build_gcs(bucket: &str, credentials_base64: Option<&str>) -> StorageResult<GoogleCloudStorage> {
    use base64::Engine;

    let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);

    if let Some(encoded) = credentials_base64 {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                StorageError::ConfigError(format!("Credentials are not valid base64: {}", e))
            })?;
        let key = String::from_utf8(decoded).map_err(|e| {
            StorageError::ConfigError(format!("Credentials are not valid UTF-8: {}", e))
        })?;
        builder = builder.with_service_account_key(key);
    }

    builder
        .build()
        .map_err(|e| StorageError::ConfigError(e.to_string()))
}

/// Build an S3 handle for `bucket`.
///
/// # Arguments
/// * `region` - AWS region (or region identifier for S3-compatible providers)
/// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
///   (e.g., "http://localhost:9000" for MinIO)
#[cfg(feature = "storage-s3")]
pub fn build_s3(bucket: &str, region: &str, endpoint_url: Option<&str>) -> StorageResult<AmazonS3> {
    let mut builder = AmazonS3Builder::from_env()
        .with_region(region)
        .with_bucket_name(bucket);

    if let Some(endpoint) = endpoint_url {
        let allow_http = endpoint.starts_with("http://");
        builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
    }

    builder
        .build()
        .map_err(|e| StorageError::ConfigError(e.to_string()))
}
