//! Remote collaborators: object store and CDN
//!
//! The sync engine only talks to these two traits. Production adapters are
//! backed by the AWS SDK:
//! - S3 and S3-compatible stores (R2, MinIO) - requires `cloud` feature
//! - CloudFront invalidations - requires `cloud` feature
//!
//! In-memory adapters are always available and back the test suite and
//! offline dry runs.
//!
//! # Feature Flags
//!
//! - `cloud`: Enables the AWS adapters (default)

#[cfg(feature = "cloud")]
mod cloudfront;
pub mod memory;
#[cfg(feature = "cloud")]
mod s3;

#[cfg(feature = "cloud")]
pub use cloudfront::CloudFrontCdn;
pub use memory::{MemoryCdn, MemoryStore, RecordedInvalidation, StoredObject};
#[cfg(feature = "cloud")]
pub use s3::S3Store;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DistributionPage, ObjectPage, PutObjectRequest};

/// Trait for remote object stores
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of the bucket listing
    ///
    /// `continuation` is the token returned by the previous page, `None`
    /// for the first page.
    async fn list_objects(&self, bucket: &str, continuation: Option<String>)
        -> Result<ObjectPage>;

    /// Upload a file as an object with the given metadata
    async fn put_object(&self, request: &PutObjectRequest) -> Result<()>;
}

/// Trait for CDN control planes
#[async_trait]
pub trait CdnClient: Send + Sync {
    /// Fetch one page of the distribution listing
    async fn list_distributions(&self, marker: Option<String>) -> Result<DistributionPage>;

    /// Submit an invalidation batch, returning the CDN's invalidation id
    ///
    /// Every path must begin with `/`. `caller_reference` must be unique
    /// per request.
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[String],
    ) -> Result<String>;
}
