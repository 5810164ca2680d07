//! Configuration module
//!
//! Storage settings are read once from the environment (after loading `.env`)
//! and are immutable for the rest of the process lifetime.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_S3_REGION: &str = "us-east-1";

/// Storage gateway configuration
#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Default bucket. When unset the client still builds, but every
    /// operation fails to resolve a bucket.
    pub bucket: Option<String>,
    /// Base64-encoded service account JSON (GCS backend)
    pub credentials_base64: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub local_signing_secret: Option<String>,
    pub operation_timeout: Option<Duration>,
    pub environment: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match var("STORAGE_BACKEND") {
            Some(s) => s.parse::<StorageBackend>()?,
            None => StorageBackend::default(),
        };

        let operation_timeout = match var("STORAGE_OPERATION_TIMEOUT_SECS") {
            Some(s) => {
                let secs: u64 = s.trim().parse().map_err(|_| {
                    anyhow::anyhow!("STORAGE_OPERATION_TIMEOUT_SECS must be a valid number")
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(StorageConfig {
            backend,
            bucket: var("STORAGE_BUCKET"),
            credentials_base64: var("STORAGE_CREDENTIALS_BASE64")
                .or_else(|| var("CREDENTIALS_BASE64")),
            s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            s3_endpoint: var("S3_ENDPOINT"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            local_signing_secret: var("LOCAL_STORAGE_SIGNING_SECRET"),
            operation_timeout,
            environment: var("ENVIRONMENT")
                .or_else(|| var("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn s3_region(&self) -> &str {
        self.s3_region.as_deref().unwrap_or(DEFAULT_S3_REGION)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.backend {
            StorageBackend::Gcs => {
                if self.is_production() && self.credentials_base64.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_CREDENTIALS_BASE64 must be set when using GCS storage in production"
                    ));
                }
            }
            StorageBackend::S3 => {
                if let Some(ref endpoint) = self.s3_endpoint {
                    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                        return Err(anyhow::anyhow!(
                            "S3_ENDPOINT must start with http:// or https://"
                        ));
                    }
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                match self.local_signing_secret {
                    Some(ref secret) if secret.len() >= 32 => {}
                    _ => {
                        return Err(anyhow::anyhow!(
                            "LOCAL_STORAGE_SIGNING_SECRET must be at least 32 characters long"
                        ))
                    }
                }
            }
        }

        Ok(())
    }
}
