//! Storage gateway
//!
//! The only component that talks to the blob store. Each operation resolves the
//! default bucket and then performs a single round trip (or, for uploads, a
//! write/finalize pair followed by signing). Failures are wrapped with the
//! operation, phase and key and returned as-is: no retries, no compensating
//! deletes, no existence checks.
//!
//! Dropping an in-flight future aborts the underlying store call. An optional
//! per-call deadline can be set with [`StorageGateway::with_operation_timeout`].

use crate::error::{ErrorKind, GatewayError, Operation, Phase};
use crate::keys::validate_key;
use crate::signed_url::{SignedUrl, SIGNED_URL_TTL};
use crate::traits::{Bucket, StorageError, StorageResult, StoreClient};
use crate::StorageBackend;
use http::Method;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gateway over a single default bucket.
///
/// Holds no mutable state; clone it or wrap it in an `Arc` to share between
/// request handlers.
#[derive(Clone)]
pub struct StorageGateway {
    client: Arc<dyn StoreClient>,
    operation_timeout: Option<Duration>,
}

impl StorageGateway {
    /// Create a gateway over an already-authenticated client.
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self {
            client,
            operation_timeout: None,
        }
    }

    /// Bound every individual store call by `timeout`.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Get the storage backend type
    pub fn backend_type(&self) -> StorageBackend {
        self.client.backend_type()
    }

    /// Write `data` to `key`, then return a fresh GET URL for it.
    ///
    /// The write and the finalize step are checked separately; signing starts
    /// only after finalize has succeeded. A failed upload may leave a partial
    /// object behind, depending on the store.
    #[tracing::instrument(skip(self, data), fields(
        storage.operation = "upload",
        storage.key = %key,
        storage.size = data.len(),
        storage.bucket = tracing::field::Empty
    ))]
    pub async fn upload(&self, key: &str, data: &[u8]) -> Result<SignedUrl, GatewayError> {
        let op = Operation::Upload;
        let start = Instant::now();

        validate_key(key).map_err(|e| failure(op, Phase::ValidateKey, key, e, start))?;
        let bucket = self.resolve_bucket(op, key, start).await?;

        let mut writer = self
            .run(bucket.writer(key))
            .await
            .map_err(|e| failure(op, Phase::Write, key, e, start))?;

        self.run(writer.write(data))
            .await
            .map_err(|e| failure(op, Phase::Write, key, e, start))?;

        self.run(writer.close())
            .await
            .map_err(|e| failure(op, Phase::Finalize, key, e, start))?;

        tracing::info!(
            bucket = %bucket.name(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage upload successful"
        );

        self.sign_get(op, key, start).await
    }

    /// Sign a GET URL for `key`, valid for exactly [`SIGNED_URL_TTL`].
    ///
    /// The object is not checked for existence first.
    #[tracing::instrument(skip(self), fields(
        storage.operation = "download_url",
        storage.key = %key,
        storage.bucket = tracing::field::Empty
    ))]
    pub async fn download_url(&self, key: &str) -> Result<SignedUrl, GatewayError> {
        let op = Operation::DownloadUrl;
        let start = Instant::now();

        validate_key(key).map_err(|e| failure(op, Phase::ValidateKey, key, e, start))?;
        self.sign_get(op, key, start).await
    }

    /// Delete `key`. Whatever the store reports for a missing object is
    /// returned unchanged.
    #[tracing::instrument(skip(self), fields(
        storage.operation = "delete",
        storage.key = %key,
        storage.bucket = tracing::field::Empty
    ))]
    pub async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let op = Operation::Delete;
        let start = Instant::now();

        validate_key(key).map_err(|e| failure(op, Phase::ValidateKey, key, e, start))?;
        let bucket = self.resolve_bucket(op, key, start).await?;

        self.run(bucket.delete(key))
            .await
            .map_err(|e| failure(op, Phase::Delete, key, e, start))?;

        tracing::info!(
            bucket = %bucket.name(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage delete successful"
        );

        Ok(())
    }

    async fn sign_get(
        &self,
        op: Operation,
        key: &str,
        start: Instant,
    ) -> Result<SignedUrl, GatewayError> {
        let bucket = self.resolve_bucket(op, key, start).await?;

        let signed = self
            .run(bucket.signed_url(key, Method::GET, SIGNED_URL_TTL))
            .await
            .map_err(|e| failure(op, Phase::Sign, key, e, start))?;

        tracing::debug!(
            bucket = %bucket.name(),
            key = %key,
            expires_at = %signed.expires_at(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Signed download URL issued"
        );

        Ok(signed)
    }

    async fn resolve_bucket(
        &self,
        op: Operation,
        key: &str,
        start: Instant,
    ) -> Result<Arc<dyn Bucket>, GatewayError> {
        let bucket = self
            .run(self.client.default_bucket())
            .await
            .map_err(|e| failure(op, Phase::ResolveBucket, key, e, start))?;
        tracing::Span::current().record("storage.bucket", bucket.name());
        Ok(bucket)
    }

    async fn run<T, F>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(StorageError::Timeout(limit))),
            None => fut.await,
        }
    }
}

fn failure(
    op: Operation,
    phase: Phase,
    key: &str,
    source: StorageError,
    start: Instant,
) -> GatewayError {
    let err = GatewayError::new(op, phase, key, source);
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    match err.kind() {
        ErrorKind::InvalidInput => tracing::debug!(
            error = %err,
            key = %key,
            "Storage request rejected"
        ),
        ErrorKind::Resolution => tracing::warn!(
            error = %err,
            operation = %op,
            key = %key,
            duration_ms,
            "Storage bucket resolution failed"
        ),
        ErrorKind::Io => tracing::error!(
            error = %err,
            operation = %op,
            phase = %phase,
            key = %key,
            duration_ms,
            "Storage operation failed"
        ),
    }

    err
}
