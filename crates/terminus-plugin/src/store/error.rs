//! Error types for object store operations.

use thiserror::Error;

use crate::archive::RewriteError;
use crate::config::ConfigError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket or key cannot be mapped onto a path below the store root.
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Config map passed by the host was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// A signed URL was requested with a negative lifetime.
    #[error("backup expired: ttl {ttl_secs}s for {bucket}/{key}")]
    Expired {
        bucket: String,
        key: String,
        ttl_secs: i64,
    },

    /// Filesystem error.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Rewriting a downloaded backup archive failed.
    #[error("failed to rewrite {key}: {source}")]
    Rewrite {
        key: String,
        #[source]
        source: RewriteError,
    },

    /// Generic error from the underlying object store.
    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl StoreError {
    /// Returns true if this error indicates the object was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            _ => 1,
        }
    }

    /// Create from object_store error with context about the object.
    pub fn from_object_store(err: object_store::Error, bucket: &str, key: &str) -> Self {
        match &err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            object_store::Error::InvalidPath { .. } => StoreError::InvalidKey {
                key: key.to_string(),
                reason: err.to_string(),
            },
            _ => StoreError::ObjectStore(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
        }
    }
}
