//! Incremental sync engine
//!
//! Mirrors a local directory into a bucket, uploading only files whose
//! post-transform digest differs from the remote entity tag, then
//! invalidates the changed paths on the CDN.
//!
//! Pipeline:
//! - [`inventory`]: frozen snapshot of remote digests
//! - [`enumerate`]: directory walk into a bounded queue
//! - [`worker`]: N workers transforming, hashing and uploading
//! - [`collector`]: fan-in of changed keys
//! - [`invalidate`]: one CDN invalidation batch per run

pub mod collector;
pub mod engine;
pub mod enumerate;
pub mod hasher;
pub mod invalidate;
pub mod inventory;
pub mod mime;
pub mod transform;
pub mod worker;

pub use collector::ChangedKeySet;
pub use engine::SyncEngine;
pub use inventory::RemoteInventory;
pub use transform::{PreparedUpload, TransformPolicy};
pub use worker::{needs_upload, normalize_remote_path, FileOutcome, UploadWorker};
