//! Core types for sitesync

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::transform::TransformPolicy;

/// Canned ACL applied to every uploaded object
pub const PUBLIC_READ_ACL: &str = "public-read";

/// Cache directive applied to every uploaded object unless overridden
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=900";

/// Capacity of the file and changed-key queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A candidate file discovered under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path on disk
    pub path: PathBuf,
    /// Synchronization key: path relative to the root, `/`-separated
    pub key: String,
    /// Size in bytes at enumeration time
    pub size: u64,
    pub is_dir: bool,
}

/// One entry of a remote listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Entity tag as returned by the store, quotes included
    pub etag: String,
}

/// A page of a remote listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Continuation token, `None` on the last page
    pub next: Option<String>,
}

/// Everything needed to put one object
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    /// File whose bytes become the object body
    pub source: PathBuf,
    pub cache_control: String,
    pub content_encoding: Option<String>,
    pub content_type: String,
    pub acl: String,
}

/// A CDN distribution and the domain aliases it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub aliases: Vec<String>,
}

/// A page of a distribution listing
#[derive(Debug, Clone, Default)]
pub struct DistributionPage {
    pub distributions: Vec<Distribution>,
    /// Marker for the next page, `None` when the listing is complete
    pub next: Option<String>,
}

/// Configuration for a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Target bucket
    pub bucket: String,
    /// Local directory to mirror
    pub root: PathBuf,
    /// Domain whose CDN distribution gets invalidated
    #[serde(default)]
    pub domain: Option<String>,
    /// Upload every file regardless of digest
    #[serde(default)]
    pub force: bool,
    /// Number of concurrent upload workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    #[serde(default = "default_acl")]
    pub acl: String,
    /// Submit a CDN invalidation for changed keys
    #[serde(default = "default_true")]
    pub invalidate: bool,
    /// Run every step except the upload and invalidation calls
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub follow_links: bool,
    /// Extra attempts for retryable upload failures
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,
    #[serde(default)]
    pub transform: TransformPolicy,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

fn default_acl() -> String {
    PUBLIC_READ_ACL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    200
}

impl SyncOptions {
    /// Options with defaults for everything but the bucket and root
    pub fn new(bucket: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let bucket = bucket.into();
        Self {
            domain: Some(bucket.clone()),
            bucket,
            root: root.into(),
            force: false,
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            cache_control: default_cache_control(),
            acl: default_acl(),
            invalidate: true,
            dry_run: false,
            follow_links: false,
            retries: default_retries(),
            retry_base_delay_ms: default_retry_delay(),
            transform: TransformPolicy::default(),
        }
    }
}

/// Per-worker counters, summed into the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub uploaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes_uploaded: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: WorkerStats) {
        self.uploaded += other.uploaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.bytes_uploaded += other.bytes_uploaded;
    }

    pub fn processed(&self) -> u64 {
        self.uploaded + self.skipped + self.failed
    }
}

/// Summary of a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub bucket: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Objects present remotely before the run
    pub remote_objects: usize,
    pub files_scanned: u64,
    #[serde(flatten)]
    pub stats: WorkerStats,
    /// Normalized paths of uploaded objects, in completion order
    pub changed_keys: Vec<String>,
    pub invalidation_id: Option<String>,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
