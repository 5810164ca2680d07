//! Apptrack Storage Library
//!
//! This crate owns every interaction with the blob store that holds job
//! application artifacts (resumes, site screenshots). The [`StorageGateway`]
//! uploads objects, issues signed GET URLs that expire after
//! [`SIGNED_URL_TTL`], and deletes objects, always against a single default
//! bucket resolved per call.
//!
//! # Backends
//!
//! - **GCS** (`storage-gcs`): Google Cloud Storage, including Firebase buckets
//! - **S3** (`storage-s3`): AWS S3 and S3-compatible providers
//! - **Local** (`storage-local`): a directory tree with HMAC-signed URLs, for
//!   development and tests
//!
//! Keys are opaque, path-like strings validated by the `keys` module so all
//! backends reject the same inputs.

#[cfg(any(feature = "storage-gcs", feature = "storage-s3"))]
pub mod cloud;
pub mod error;
pub mod factory;
pub mod gateway;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod signed_url;
pub mod traits;

// Re-export commonly used types
#[cfg(any(feature = "storage-gcs", feature = "storage-s3"))]
pub use cloud::ObjectStoreClient;
pub use apptrack_core::StorageBackend;
pub use error::{ErrorKind, GatewayError, Operation, Phase};
pub use factory::{create_gateway, create_store_client};
pub use gateway::StorageGateway;
#[cfg(feature = "storage-local")]
pub use local::{LocalBucket, LocalStorageClient};
pub use signed_url::{SignedUrl, SIGNED_URL_TTL};
pub use traits::{Bucket, ObjectWriter, StorageError, StorageResult, StoreClient};
