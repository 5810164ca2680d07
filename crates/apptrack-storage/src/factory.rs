#[cfg(any(feature = "storage-gcs", feature = "storage-s3"))]
use crate::cloud::ObjectStoreClient;
#[cfg(feature = "storage-local")]
use crate::local::LocalStorageClient;
use crate::{StorageBackend, StorageError, StorageGateway, StorageResult, StoreClient};
use apptrack_core::StorageConfig;
use std::sync::Arc;

/// Create a storage client based on configuration
///
/// Credentials are checked here, once, at startup. A failure is a
/// configuration error the caller should treat as fatal. A missing bucket name
/// is not: the client is built and every operation fails bucket resolution.
pub async fn create_store_client(config: &StorageConfig) -> StorageResult<Arc<dyn StoreClient>> {
    if config.bucket.is_none() {
        tracing::warn!(
            backend = %config.backend,
            "STORAGE_BUCKET not configured; storage operations will fail"
        );
    }

    match config.backend {
        #[cfg(feature = "storage-gcs")]
        StorageBackend::Gcs => {
            let client = match config.bucket.as_deref() {
                Some(bucket) => {
                    let store =
                        crate::cloud::build_gcs(bucket, config.credentials_base64.as_deref())?;
                    ObjectStoreClient::new(StorageBackend::Gcs, bucket, store)
                }
                None => ObjectStoreClient::<object_store::gcp::GoogleCloudStorage>::without_default_bucket(
                    StorageBackend::Gcs,
                ),
            };
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-gcs"))]
        StorageBackend::Gcs => Err(StorageError::ConfigError(
            "GCS storage backend not available (storage-gcs feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let client = match config.bucket.as_deref() {
                Some(bucket) => {
                    let store = crate::cloud::build_s3(
                        bucket,
                        config.s3_region(),
                        config.s3_endpoint.as_deref(),
                    )?;
                    ObjectStoreClient::new(StorageBackend::S3, bucket, store)
                }
                None => ObjectStoreClient::<object_store::aws::AmazonS3>::without_default_bucket(
                    StorageBackend::S3,
                ),
            };
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;
            let secret = config.local_signing_secret.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_SIGNING_SECRET not configured".to_string())
            })?;

            let client = LocalStorageClient::new(
                base_path,
                base_url,
                secret.into_bytes(),
                config.bucket.clone(),
            )
            .await?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Create the gateway described by `config`, applying its operation timeout.
pub async fn create_gateway(config: &StorageConfig) -> StorageResult<StorageGateway> {
    let client = create_store_client(config).await?;
    let gateway = StorageGateway::new(client);

    Ok(match config.operation_timeout {
        Some(timeout) => gateway.with_operation_timeout(timeout),
        None => gateway,
    })
}
