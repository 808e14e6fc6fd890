//! Sync run orchestration
//!
//! inventory -> (walk | workers | collector) -> invalidation
//!
//! The inventory is fetched and frozen first. The walk, the worker pool
//! and the collector then run concurrently over two bounded queues. Only
//! after every worker has exited is the changed-key set handed to the
//! invalidation batcher.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::collector::spawn_collector;
use super::enumerate::spawn_enumerator;
use super::invalidate::invalidate;
use super::inventory::RemoteInventory;
use super::worker::{run_pool, UploadContext};
use crate::cloud::{CdnClient, ObjectStore};
use crate::error::{Result, SyncError};
use crate::types::{SyncOptions, SyncReport};

/// Incremental directory-to-bucket sync
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    cdn: Arc<dyn CdnClient>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cdn: Arc<dyn CdnClient>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            cdn,
            options,
        }
    }

    /// Run one sync to completion
    ///
    /// Fatal errors (inventory, walk, CDN) abort the run. Per-file failures
    /// are counted in the report. When `cancel` fires, no new files are
    /// started, in-flight uploads finish, and invalidation is skipped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<SyncReport> {
        let started_at = Utc::now();
        let options = &self.options;
        if options.queue_capacity == 0 {
            return Err(SyncError::Config(
                "queue capacity must be positive".to_string(),
            ));
        }

        tracing::info!(
            "Syncing {} to s3://{} with {} workers{}{}",
            options.root.display(),
            options.bucket,
            options.workers.max(1),
            if options.force { " (force)" } else { "" },
            if options.dry_run { " (dry run)" } else { "" },
        );

        let inventory = RemoteInventory::fetch(self.store.as_ref(), &options.bucket).await?;
        let inventory = Arc::new(inventory);
        let remote_objects = inventory.len();

        let (file_tx, file_rx) = async_channel::bounded(options.queue_capacity);
        let (changed_tx, changed_rx) = async_channel::bounded(options.queue_capacity);

        let walker = spawn_enumerator(
            options.root.clone(),
            options.follow_links,
            file_tx,
            cancel.clone(),
        );
        let collector = spawn_collector(changed_rx);

        let ctx = Arc::new(UploadContext::new(
            Arc::clone(&self.store),
            inventory,
            options,
        ));
        let stats = run_pool(options.workers, ctx, file_rx, changed_tx, cancel.clone()).await?;

        let changed = collector
            .await
            .map_err(|e| SyncError::Internal(format!("collector task failed: {}", e)))?;
        let files_scanned = walker
            .await
            .map_err(|e| SyncError::Internal(format!("walk task failed: {}", e)))??;

        let cancelled = cancel.is_cancelled();
        let changed_keys = changed.as_slice().to_vec();

        let invalidation_id = match (&options.domain, cancelled) {
            (_, true) => {
                tracing::warn!("Sync cancelled, skipping invalidation");
                None
            }
            (Some(domain), false) if options.invalidate && !options.dry_run => {
                invalidate(self.cdn.as_ref(), domain, changed).await?
            }
            _ => {
                tracing::debug!("Invalidation disabled");
                None
            }
        };

        let report = SyncReport {
            bucket: options.bucket.clone(),
            started_at,
            completed_at: Utc::now(),
            remote_objects,
            files_scanned,
            stats,
            changed_keys,
            invalidation_id,
            cancelled,
            dry_run: options.dry_run,
        };

        tracing::info!(
            "Sync finished in {}ms: {} processed, {} uploaded, {} unchanged, {} failed",
            report.duration_ms(),
            report.stats.processed(),
            report.stats.uploaded,
            report.stats.skipped,
            report.stats.failed
        );
        Ok(report)
    }
}
