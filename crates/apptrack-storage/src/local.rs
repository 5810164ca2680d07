use crate::keys::validate_key;
use crate::signed_url::SignedUrl;
use crate::traits::{Bucket, ObjectWriter, StorageError, StorageResult, StoreClient};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use http::Method;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Local filesystem storage client
///
/// Each bucket is a sub-directory of `base_path`. Signed URLs point at
/// `{base_url}/{bucket}/{key}` and carry an HMAC-SHA256 signature over the
/// method, bucket, key, expiry and a per-URL nonce; whatever serves
/// `base_url` checks them with [`LocalBucket::verify_signed_url`].
#[derive(Clone)]
pub struct LocalStorageClient {
    base_path: PathBuf,
    bucket: Option<Arc<LocalBucket>>,
}

impl LocalStorageClient {
    /// Create a new LocalStorageClient instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for all buckets (e.g., "/var/lib/apptrack/storage")
    /// * `base_url` - Base URL the files are served from (e.g., "http://localhost:8080/files")
    /// * `signing_secret` - HMAC key for signed URLs
    /// * `default_bucket` - Bucket every operation targets; `None` makes every
    ///   bucket resolution fail
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signing_secret: Vec<u8>,
        default_bucket: Option<String>,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        if signing_secret.is_empty() {
            return Err(StorageError::ConfigError(
                "Local storage signing secret must not be empty".to_string(),
            ));
        }

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let bucket = match default_bucket {
            Some(name) => {
                if name.is_empty() || name.contains('/') || name.contains("..") {
                    return Err(StorageError::ConfigError(format!(
                        "Invalid bucket name: {}",
                        name
                    )));
                }

                let root = base_path.join(&name);
                fs::create_dir_all(&root).await.map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Failed to create bucket directory {}: {}",
                        root.display(),
                        e
                    ))
                })?;

                Some(Arc::new(LocalBucket {
                    name,
                    root,
                    base_url: base_url.trim_end_matches('/').to_string(),
                    signing_secret,
                }))
            }
            None => None,
        };

        Ok(LocalStorageClient { base_path, bucket })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The configured bucket without going through resolution (for serving
    /// and verifying signed URLs).
    pub fn bucket(&self) -> Option<Arc<LocalBucket>> {
        self.bucket.clone()
    }
}

#[async_trait]
impl StoreClient for LocalStorageClient {
    async fn default_bucket(&self) -> StorageResult<Arc<dyn Bucket>> {
        let bucket = self.bucket.clone().ok_or(StorageError::NoDefaultBucket)?;

        match fs::metadata(&bucket.root).await {
            Ok(meta) if meta.is_dir() => Ok(bucket as Arc<dyn Bucket>),
            Ok(_) => Err(StorageError::BackendError(format!(
                "Bucket path {} is not a directory",
                bucket.root.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::BackendError(format!(
                    "Bucket directory {} does not exist",
                    bucket.root.display()
                )))
            }
            Err(e) => Err(StorageError::BackendError(format!(
                "Failed to access bucket directory {}: {}",
                bucket.root.display(),
                e
            ))),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// One bucket directory on the local filesystem
pub struct LocalBucket {
    name: String,
    root: PathBuf,
    base_url: String,
    signing_secret: Vec<u8>,
}

impl LocalBucket {
    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that would resolve outside the bucket directory, including
    /// through symlinks that already exist on disk.
    async fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let path = self.root.join(key);

        let root_canonical = fs::canonicalize(&self.root).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize bucket path: {}", e))
        })?;

        if let Ok(canonical) = fs::canonicalize(&path).await {
            if canonical.strip_prefix(&root_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside bucket directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Object URL without signature
    fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.base_url, self.name, encoded.join("/"))
    }

    fn mac(&self) -> StorageResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.signing_secret)
            .map_err(|e| StorageError::SigningFailed(e.to_string()))
    }

    fn string_to_sign(&self, method: &str, key: &str, expires: i64, nonce: &str) -> String {
        format!("{}\n{}\n{}\n{}\n{}", method, self.name, key, expires, nonce)
    }

    /// Verify a URL produced by [`Bucket::signed_url`] for a request made with
    /// `method` at `now`. Returns the object key on success.
    pub fn verify_signed_url(
        &self,
        signed_url: &str,
        method: &Method,
        now: DateTime<Utc>,
    ) -> StorageResult<String> {
        let parsed = url::Url::parse(signed_url)
            .map_err(|e| StorageError::Forbidden(format!("Malformed signed URL: {}", e)))?;

        let prefix = format!("{}/{}/", self.base_url, self.name);
        let without_query = signed_url.split('?').next().unwrap_or_default();
        let encoded_key = without_query
            .strip_prefix(&prefix)
            .ok_or_else(|| StorageError::Forbidden("URL does not belong to this bucket".to_string()))?;
        let key = encoded_key
            .split('/')
            .map(|segment| urlencoding::decode(segment).map(|s| s.into_owned()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Forbidden(format!("Malformed object path: {}", e)))?
            .join("/");

        let mut signed_method = None;
        let mut expires = None;
        let mut nonce = None;
        let mut signature = None;
        for (name, value) in parsed.query_pairs() {
            match name.as_ref() {
                "method" => signed_method = Some(value.into_owned()),
                "expires" => expires = value.parse::<i64>().ok(),
                "nonce" => nonce = Some(value.into_owned()),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let (signed_method, expires, nonce, signature) = match (signed_method, expires, nonce, signature) {
            (Some(m), Some(e), Some(n), Some(s)) => (m, e, n, s),
            _ => {
                return Err(StorageError::Forbidden(
                    "Signed URL is missing required parameters".to_string(),
                ))
            }
        };

        let tag = hex::decode(&signature)
            .map_err(|_| StorageError::Forbidden("Invalid signature encoding".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(
            self.string_to_sign(&signed_method, &key, expires, &nonce)
                .as_bytes(),
        );
        mac.verify_slice(&tag)
            .map_err(|_| StorageError::Forbidden("Signature mismatch".to_string()))?;

        if signed_method != method.as_str() {
            return Err(StorageError::Forbidden(format!(
                "URL is signed for {} only",
                signed_method
            )));
        }

        if now.timestamp() >= expires {
            return Err(StorageError::Forbidden("Signed URL has expired".to_string()));
        }

        Ok(key)
    }
}

#[async_trait]
impl Bucket for LocalBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn writer(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>> {
        let path = self.key_to_path(key).await?;

        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(format!("Key has no parent: {}", key)))?;
        fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| StorageError::InvalidKey(format!("Key has no file name: {}", key)))?
            .to_string_lossy()
            .into_owned();
        let temp_path = parent.join(format!(".{}.{}.partial", file_name, Uuid::new_v4().simple()));

        let file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        Ok(Box::new(LocalObjectWriter {
            file: Some(file),
            temp_path,
            final_path: path,
            committed: false,
        }))
    }

    async fn signed_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> StorageResult<SignedUrl> {
        self.key_to_path(key).await?;

        // The URL carries whole seconds; the reported window must match it.
        let ttl = Duration::from_secs(expires_in.as_secs());
        let chrono_ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;
        let issued_at = Utc::now().trunc_subsecs(0);
        let expires = (issued_at + chrono_ttl).timestamp();
        let nonce = Uuid::new_v4().simple().to_string();

        let mut mac = self.mac()?;
        mac.update(
            self.string_to_sign(method.as_str(), key, expires, &nonce)
                .as_bytes(),
        );
        let signature = hex::encode(mac.finalize().into_bytes());

        let url = format!(
            "{}?method={}&expires={}&nonce={}&signature={}",
            self.object_url(key),
            method.as_str(),
            expires,
            nonce,
            signature
        );

        Ok(SignedUrl::new(url, method, issued_at, ttl))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key).await?;

        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::BackendError(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            )),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key).await?;
        Ok(fs::try_exists(&path).await?)
    }
}

/// Writes into a hidden partial file and renames it into place on close, so
/// readers never observe a half-written object.
struct LocalObjectWriter {
    file: Option<fs::File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

#[async_trait]
impl ObjectWriter for LocalObjectWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::BackendError("Writer already closed".to_string()))?;

        file.write_all(data).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to write file {}: {}",
                self.temp_path.display(),
                e
            ))
        })
    }

    async fn close(mut self: Box<Self>) -> StorageResult<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StorageError::BackendError("Writer already closed".to_string()))?;

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to sync file {}: {}",
                self.temp_path.display(),
                e
            ))
        })?;
        drop(file);

        fs::rename(&self.temp_path, &self.final_path)
            .await
            .map_err(|e| {
                StorageError::BackendError(format!(
                    "Failed to commit file {}: {}",
                    self.final_path.display(),
                    e
                ))
            })?;
        self.committed = true;

        Ok(())
    }
}

impl Drop for LocalObjectWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const BASE_URL: &str = "http://localhost:8080/files";

    async fn client(dir: &Path) -> LocalStorageClient {
        LocalStorageClient::new(
            dir,
            BASE_URL.to_string(),
            SECRET.to_vec(),
            Some("artifacts".to_string()),
        )
        .await
        .unwrap()
    }

    async fn put(bucket: &dyn Bucket, key: &str, data: &[u8]) {
        let mut writer = bucket.writer(key).await.unwrap();
        writer.write(data).await.unwrap();
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_storage_write_and_close() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        put(bucket.as_ref(), "resumes/alice.pdf", b"test data").await;

        let stored = std::fs::read(dir.path().join("artifacts/resumes/alice.pdf")).unwrap();
        assert_eq!(stored, b"test data");
        assert!(bucket.exists("resumes/alice.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_object_invisible_until_closed() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        let mut writer = bucket.writer("screenshots/job.png").await.unwrap();
        writer.write(b"partial").await.unwrap();
        assert!(!bucket.exists("screenshots/job.png").await.unwrap());

        writer.close().await.unwrap();
        assert!(bucket.exists("screenshots/job.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_abandoned_writer_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        let mut writer = bucket.writer("tmp/abandoned.bin").await.unwrap();
        writer.write(b"bytes").await.unwrap();
        drop(writer);

        let leftovers = std::fs::read_dir(dir.path().join("artifacts/tmp"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        let result = bucket.writer("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = bucket.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = bucket
            .signed_url("/etc/passwd", Method::GET, Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_not_found() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        let result = bucket.delete("missing.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(ref k)) if k == "missing.pdf"));
    }

    #[tokio::test]
    async fn test_signed_url_verifies_for_get_only() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.bucket().unwrap();

        let url = bucket
            .signed_url("resumes/alice smith.pdf", Method::GET, Duration::from_secs(1800))
            .await
            .unwrap();

        assert!(url
            .as_str()
            .starts_with("http://localhost:8080/files/artifacts/resumes/alice%20smith.pdf?"));
        assert_eq!(*url.method(), Method::GET);

        let now = Utc::now();
        let key = bucket.verify_signed_url(url.as_str(), &Method::GET, now).unwrap();
        assert_eq!(key, "resumes/alice smith.pdf");

        let result = bucket.verify_signed_url(url.as_str(), &Method::PUT, now);
        assert!(matches!(result, Err(StorageError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_signed_url_expires() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.bucket().unwrap();

        let url = bucket
            .signed_url("a.pdf", Method::GET, Duration::from_secs(1800))
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::minutes(31);
        let result = bucket.verify_signed_url(url.as_str(), &Method::GET, later);
        assert!(matches!(result, Err(StorageError::Forbidden(ref m)) if m.contains("expired")));
    }

    #[tokio::test]
    async fn test_tampered_url_rejected() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.bucket().unwrap();

        let url = bucket
            .signed_url("a.pdf", Method::GET, Duration::from_secs(1800))
            .await
            .unwrap();
        let tampered = url.as_str().replace("/a.pdf?", "/b.pdf?");

        let result = bucket.verify_signed_url(&tampered, &Method::GET, Utc::now());
        assert!(matches!(result, Err(StorageError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_signing_missing_object_is_allowed_and_unique() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.default_bucket().await.unwrap();

        let first = bucket
            .signed_url("never-uploaded.pdf", Method::GET, Duration::from_secs(1800))
            .await
            .unwrap();
        let second = bucket
            .signed_url("never-uploaded.pdf", Method::GET, Duration::from_secs(1800))
            .await
            .unwrap();
        assert_ne!(first.as_str(), second.as_str());
    }

    #[tokio::test]
    async fn test_no_default_bucket_fails_resolution() {
        let dir = tempdir().unwrap();
        let client = LocalStorageClient::new(dir.path(), BASE_URL.to_string(), SECRET.to_vec(), None)
            .await
            .unwrap();

        let result = client.default_bucket().await;
        assert!(matches!(result, Err(StorageError::NoDefaultBucket)));
    }

    #[tokio::test]
    async fn test_removed_bucket_directory_fails_resolution() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        std::fs::remove_dir_all(dir.path().join("artifacts")).unwrap();

        let result = client.default_bucket().await;
        assert!(matches!(result, Err(StorageError::BackendError(ref m)) if m.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_unreadable_bucket_path_reports_io_error() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("store");
        let client = client(&base).await;

        // A file where the base directory was makes the lookup fail with
        // ENOTDIR rather than NotFound.
        std::fs::remove_dir_all(&base).unwrap();
        std::fs::write(&base, b"not a directory").unwrap();

        let result = client.default_bucket().await;
        assert!(
            matches!(result, Err(StorageError::BackendError(ref m)) if m.contains("Failed to access"))
        );
    }

    #[tokio::test]
    async fn test_bucket_path_replaced_by_file_fails_resolution() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        std::fs::remove_dir_all(dir.path().join("artifacts")).unwrap();
        std::fs::write(dir.path().join("artifacts"), b"").unwrap();

        let result = client.default_bucket().await;
        assert!(
            matches!(result, Err(StorageError::BackendError(ref m)) if m.contains("not a directory"))
        );
    }

    #[tokio::test]
    async fn test_reported_expiry_matches_url_expiry() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let bucket = client.bucket().unwrap();

        for _ in 0..20 {
            let url = bucket
                .signed_url("resumes/alice.pdf", Method::GET, Duration::from_secs(1800))
                .await
                .unwrap();

            let parsed = url::Url::parse(url.as_str()).unwrap();
            let expires: i64 = parsed
                .query_pairs()
                .find(|(k, _)| k == "expires")
                .map(|(_, v)| v.parse().unwrap())
                .unwrap();

            assert_eq!(url.expires_at().timestamp_millis(), expires * 1000);
            assert_eq!(url.expires_at() - url.issued_at(), chrono::Duration::minutes(30));

            // Valid up to the reported expiry, rejected from it onwards.
            let just_before = url.expires_at() - chrono::Duration::milliseconds(1);
            assert!(bucket
                .verify_signed_url(url.as_str(), &Method::GET, just_before)
                .is_ok());
            assert!(!url.is_expired_at(just_before));
            assert!(bucket
                .verify_signed_url(url.as_str(), &Method::GET, url.expires_at())
                .is_err());
            assert!(url.is_expired_at(url.expires_at()));
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_secret_and_bad_bucket_name() {
        let dir = tempdir().unwrap();
        let result =
            LocalStorageClient::new(dir.path(), BASE_URL.to_string(), Vec::new(), None).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));

        let result = LocalStorageClient::new(
            dir.path(),
            BASE_URL.to_string(),
            SECRET.to_vec(),
            Some("../up".to_string()),
        )
        .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
