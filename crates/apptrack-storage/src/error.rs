//! Gateway error type
//!
//! Every store failure is wrapped with the operation, the phase that failed and
//! the object key, then handed back to the caller unchanged in kind. The
//! gateway never retries.

use crate::traits::StorageError;
use apptrack_core::AppError;
use std::fmt;

/// Gateway operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    DownloadUrl,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "upload"),
            Operation::DownloadUrl => write!(f, "download_url"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Step of an operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ValidateKey,
    ResolveBucket,
    Write,
    Finalize,
    Sign,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::ValidateKey => write!(f, "key validation"),
            Phase::ResolveBucket => write!(f, "bucket resolution"),
            Phase::Write => write!(f, "write"),
            Phase::Finalize => write!(f, "finalize"),
            Phase::Sign => write!(f, "signing"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// Coarse classification for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The key was rejected before any store call
    InvalidInput,
    /// The default bucket could not be resolved
    Resolution,
    /// A write, finalize, sign or delete call failed or timed out
    Io,
}

#[derive(Debug, thiserror::Error)]
#[error("{operation} of '{key}' failed during {phase}: {source}")]
pub struct GatewayError {
    operation: Operation,
    phase: Phase,
    key: String,
    #[source]
    source: StorageError,
}

impl GatewayError {
    pub fn new(operation: Operation, phase: Phase, key: impl Into<String>, source: StorageError) -> Self {
        Self {
            operation,
            phase,
            key: key.into(),
            source,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The store-level error, unchanged
    pub fn storage_error(&self) -> &StorageError {
        &self.source
    }

    pub fn into_storage_error(self) -> StorageError {
        self.source
    }

    pub fn kind(&self) -> ErrorKind {
        match self.phase {
            Phase::ValidateKey => ErrorKind::InvalidInput,
            Phase::ResolveBucket => ErrorKind::Resolution,
            Phase::Write | Phase::Finalize | Phase::Sign | Phase::Delete => ErrorKind::Io,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.source, StorageError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.source, StorageError::NotFound(_))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        let message = format!("{} of '{}' failed during {}", err.operation, err.key, err.phase);
        let source: Box<dyn std::error::Error + Send + Sync> =
            Box::new(err.into_storage_error());

        match kind {
            ErrorKind::InvalidInput => AppError::InvalidInput { message, source },
            ErrorKind::Resolution | ErrorKind::Io => AppError::Storage { message, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apptrack_core::ErrorMetadata;

    #[test]
    fn message_names_operation_phase_and_key() {
        let err = GatewayError::new(
            Operation::Upload,
            Phase::Finalize,
            "resumes/alice.pdf",
            StorageError::BackendError("quota exceeded".to_string()),
        );

        assert_eq!(
            err.to_string(),
            "upload of 'resumes/alice.pdf' failed during finalize: Storage backend error: quota exceeded"
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_timeout());
    }

    #[test]
    fn resolution_phase_maps_to_resolution_kind() {
        let err = GatewayError::new(
            Operation::Delete,
            Phase::ResolveBucket,
            "a.pdf",
            StorageError::NoDefaultBucket,
        );
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(matches!(err.storage_error(), StorageError::NoDefaultBucket));
    }

    #[test]
    fn converts_to_generic_app_error() {
        let err = GatewayError::new(
            Operation::DownloadUrl,
            Phase::Sign,
            "resumes/alice.pdf",
            StorageError::SigningFailed("missing private key".to_string()),
        );

        let app_err = AppError::from(err);
        assert_eq!(app_err.client_message(), "Storage operation failed");
        assert!(!app_err.client_message().contains("alice"));
        assert!(app_err.is_sensitive());

        let details = app_err.detailed_message();
        assert!(details.contains("download_url of 'resumes/alice.pdf' failed during signing"));
        assert!(details.contains("Caused by: URL signing failed: missing private key"));
    }

    #[test]
    fn invalid_key_is_a_client_error_without_details() {
        let err = GatewayError::new(
            Operation::Upload,
            Phase::ValidateKey,
            "../secret/alice.pdf",
            StorageError::InvalidKey(
                "key must not contain '..' segments: ../secret/alice.pdf".to_string(),
            ),
        );
        let app_err = AppError::from(err);

        assert!(matches!(app_err, AppError::InvalidInput { .. }));
        assert_eq!(app_err.http_status_code(), 400);
        assert_eq!(app_err.client_message(), "Invalid storage key");
        assert!(!app_err.client_message().contains("secret"));
        assert!(app_err.detailed_message().contains("../secret/alice.pdf"));
    }
}
