//! sitesync - incremental static-site deployment
//!
//! Mirrors a local directory tree into an S3-compatible bucket, uploading
//! only what changed, and invalidates the changed paths on CloudFront.

pub mod cloud;
pub mod error;
pub mod sync;
pub mod types;

pub use error::{Result, SyncError};
pub use sync::SyncEngine;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
