//! Error types for sitesync

use thiserror::Error;

/// Result type alias for sitesync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for sitesync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch remote inventory: {0}")]
    Inventory(String),

    #[error("Directory walk failed: {0}")]
    Walk(String),

    #[error("Transform error for {path}: {message}")]
    Transform { path: String, message: String },

    #[error("Upload of {key} failed: {message}")]
    Upload {
        key: String,
        message: String,
        retryable: bool,
    },

    #[error("Object store error: {0}")]
    Store(String),

    #[error("CDN error: {0}")]
    Cdn(String),

    #[error("No CDN distribution has alias {0}")]
    DistributionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Upload { retryable, .. } => *retryable,
            SyncError::Store(_) => true,
            _ => false,
        }
    }
}
