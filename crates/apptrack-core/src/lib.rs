//! Apptrack Core Library
//!
//! This crate provides the configuration, error types and storage backend
//! identifiers shared by the application tracker crates.

pub mod config;
pub mod error;
pub mod storage_types;

// Re-export commonly used types
pub use config::StorageConfig;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
