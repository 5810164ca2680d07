//! Error types module
//!
//! Lower layers (such as the storage gateway) keep their own detailed error
//! types and convert into `AppError` at the API boundary, where
//! `ErrorMetadata` decides what a caller is allowed to see. Keys, bucket names
//! and backend messages stay in `detailed_message()` and the logs.

use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like rejected input
    Debug,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried by the caller)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message; never carries request details
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the caller
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A storage key was rejected before reaching the store
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[source]
        source: BoxError,
    },

    /// The store failed or could not be reached
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl AppError {
    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput { .. } => 400,
            AppError::Storage { .. } => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "INVALID_INPUT",
            AppError::Storage { .. } => "STORAGE_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Storage { .. })
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput { .. } => "Invalid storage key".to_string(),
            AppError::Storage { .. } => "Storage operation failed".to_string(),
        }
    }

    fn is_sensitive(&self) -> bool {
        true
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::InvalidInput { .. } => LogLevel::Debug,
            AppError::Storage { .. } => LogLevel::Error,
        }
    }
}
