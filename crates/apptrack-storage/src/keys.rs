//! Object key validation shared by every backend.
//!
//! Keys are caller-chosen and may be path-like (`resumes/alice.pdf`). They must
//! be non-empty, must not start with `/`, must not contain a `..` segment and
//! must not contain control characters.

use crate::traits::{StorageError, StorageResult};

/// Validate an object key before it reaches a store.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }

    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "key must not start with '/': {}",
            key
        )));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "key must not contain '..' segments: {}",
            key
        )));
    }

    if key.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(
            "key must not contain control characters".to_string(),
        ));
    }

    Ok(())
}
