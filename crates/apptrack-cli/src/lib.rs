use anyhow::Context;
use apptrack_storage::SignedUrl;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// JSON printed for `upload` and `url`.
#[derive(Debug, Serialize)]
pub struct UrlOutput<'a> {
    pub key: &'a str,
    pub url: &'a str,
    pub method: &'a str,
    pub expires_at: DateTime<Utc>,
}

impl<'a> UrlOutput<'a> {
    pub fn new(key: &'a str, signed: &'a SignedUrl) -> Self {
        Self {
            key,
            url: signed.as_str(),
            method: signed.method().as_str(),
            expires_at: signed.expires_at(),
        }
    }
}

/// Read the whole payload to upload.
pub async fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
