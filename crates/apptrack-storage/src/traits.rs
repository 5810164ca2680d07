//! Object store client abstraction
//!
//! The gateway never talks to a storage SDK directly. It composes the three
//! primitives defined here: a client that resolves the default bucket, a bucket
//! that opens writers, signs URLs and deletes objects, and a writer whose
//! `close` is the point where buffered data is committed.

use crate::signed_url::SignedUrl;
use crate::StorageBackend;
use async_trait::async_trait;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("No default bucket configured")]
    NoDefaultBucket,

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("URL signing failed: {0}")]
    SigningFailed(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Handle to an authenticated storage account.
///
/// Implementations must be safe to share across tasks; the gateway holds one
/// for the whole process lifetime.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Resolve the configured default bucket.
    ///
    /// Called on every gateway operation. Implementations may return a cached
    /// handle, but must report a missing or unusable bucket as an error each
    /// time rather than falling back to another bucket.
    async fn default_bucket(&self) -> StorageResult<Arc<dyn Bucket>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// A single storage container.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Bucket name, used for logging
    fn name(&self) -> &str;

    /// Open a write stream for the object named `key`.
    ///
    /// Nothing is guaranteed to be visible in the store until the returned
    /// writer has been closed successfully.
    async fn writer(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>>;

    /// Sign a URL granting `method` access to `key` for `expires_in`.
    ///
    /// The returned window is the one embedded in the URL, so its expiry is
    /// the instant the store starts rejecting it. Signing does not check that
    /// the object exists.
    async fn signed_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> StorageResult<SignedUrl>;

    /// Delete the object named `key`.
    ///
    /// The result for a missing object is whatever the store reports.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Write stream for one object.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Append `data` to the object. May buffer.
    async fn write(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Flush and commit the object. Errors deferred by buffering (quota,
    /// permission, network) surface here.
    async fn close(self: Box<Self>) -> StorageResult<()>;
}
