//! Upload worker pool
//!
//! Every worker pulls files from the shared queue and, per file:
//! transform, hash the bytes that would be uploaded, compare with the
//! frozen inventory, and upload when absent, changed or forced. Keys of
//! uploaded objects go to the changed-key queue. A failure on one file is
//! logged and counted; it never stops the worker or its siblings.

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::hasher::hash_file;
use super::inventory::RemoteInventory;
use super::transform::{PreparedUpload, TransformPolicy};
use crate::cloud::ObjectStore;
use crate::error::{Result, SyncError};
use crate::types::{LocalFile, PutObjectRequest, SyncOptions, WorkerStats};

/// Shared, read-only state of the pool
pub struct UploadContext {
    pub store: Arc<dyn ObjectStore>,
    pub inventory: Arc<RemoteInventory>,
    pub policy: TransformPolicy,
    pub bucket: String,
    pub cache_control: String,
    pub acl: String,
    pub force: bool,
    pub dry_run: bool,
    pub retries: u32,
    pub retry_base_delay: Duration,
}

impl UploadContext {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        inventory: Arc<RemoteInventory>,
        options: &SyncOptions,
    ) -> Self {
        Self {
            store,
            inventory,
            policy: options.transform.clone(),
            bucket: options.bucket.clone(),
            cache_control: options.cache_control.clone(),
            acl: options.acl.clone(),
            force: options.force,
            dry_run: options.dry_run,
            retries: options.retries,
            retry_base_delay: Duration::from_millis(options.retry_base_delay_ms),
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Remote copy already matches
    Skipped,
    /// Uploaded; carries the normalized remote path and body size
    Uploaded { path: String, bytes: u64 },
}

/// Characters kept literal in a path segment besides the unreserved set
const PATH_SAFE: &[u8] = b"$&+,:;=@";

/// Remote path used for invalidation: leading `/`, segments percent-encoded
///
/// Unreserved characters and the sub-delimiters `$&+,:;=@` stay literal,
/// matching how CloudFront keys cached paths. Everything else, including
/// `?`, `#`, `%` and spaces, is percent-encoded.
pub fn normalize_remote_path(key: &str) -> String {
    let encoded: Vec<String> = key
        .trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect();
    format!("/{}", encoded.join("/"))
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut buf = [0u8; 4];
    for ch in segment.chars() {
        if ch.is_ascii() && PATH_SAFE.contains(&(ch as u8)) {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Whether a file must be uploaded given its digest and the inventory
///
/// A missing digest (hashing failed) always uploads.
pub fn needs_upload(
    inventory: &RemoteInventory,
    key: &str,
    digest: Option<&str>,
    force: bool,
) -> bool {
    match digest {
        Some(digest) => force || !inventory.matches(key, digest),
        None => true,
    }
}

/// One member of the pool
pub struct UploadWorker {
    id: usize,
    ctx: Arc<UploadContext>,
}

impl UploadWorker {
    pub fn new(id: usize, ctx: Arc<UploadContext>) -> Self {
        Self { id, ctx }
    }

    /// Drain `files` until it closes or `cancel` fires
    pub async fn run(
        self,
        files: Receiver<LocalFile>,
        changed: Sender<String>,
        cancel: CancellationToken,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();

        loop {
            let file = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Worker {} cancelled", self.id);
                    break;
                }
                file = files.recv() => match file {
                    Ok(file) => file,
                    Err(_) => break,
                },
            };

            match self.process(&file).await {
                Ok(FileOutcome::Skipped) => {
                    tracing::debug!("Unchanged: {}", file.key);
                    stats.skipped += 1;
                }
                Ok(FileOutcome::Uploaded { path, bytes }) => {
                    stats.uploaded += 1;
                    stats.bytes_uploaded += bytes;
                    if changed.send(path).await.is_err() {
                        tracing::warn!("Changed-key queue closed, {} not recorded", file.key);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to sync {}: {}", file.key, e);
                    stats.failed += 1;
                }
            }
        }

        tracing::debug!("Worker {} finished: {:?}", self.id, stats);
        stats
    }

    /// Transform, compare and (maybe) upload a single file
    pub async fn process(&self, file: &LocalFile) -> Result<FileOutcome> {
        let (prepared, digest) = self.prepare(file).await?;

        if !needs_upload(
            &self.ctx.inventory,
            &file.key,
            digest.as_deref(),
            self.ctx.force,
        ) {
            return Ok(FileOutcome::Skipped);
        }

        let bytes = tokio::fs::metadata(prepared.source()).await?.len();
        let request = PutObjectRequest {
            bucket: self.ctx.bucket.clone(),
            key: file.key.clone(),
            source: prepared.source().to_path_buf(),
            cache_control: self.ctx.cache_control.clone(),
            content_encoding: prepared.content_encoding.clone(),
            content_type: prepared.content_type.clone(),
            acl: self.ctx.acl.clone(),
        };

        if self.ctx.dry_run {
            tracing::info!(
                "Would upload {} as {} ({}, {} bytes)",
                file.path.display(),
                file.key,
                request.content_type,
                bytes
            );
        } else {
            tracing::info!("Uploading {} as {}", request.source.display(), file.key);
            self.put_with_retry(&request).await?;
        }

        drop(prepared);
        Ok(FileOutcome::Uploaded {
            path: normalize_remote_path(&file.key),
            bytes,
        })
    }

    /// Transform and hash on the blocking pool
    ///
    /// A hashing failure yields `None`, which forces an upload.
    async fn prepare(&self, file: &LocalFile) -> Result<(PreparedUpload, Option<String>)> {
        let ctx = Arc::clone(&self.ctx);
        let file = file.clone();

        tokio::task::spawn_blocking(move || -> Result<(PreparedUpload, Option<String>)> {
            let prepared = ctx.policy.prepare(&file)?;
            let digest = match hash_file(prepared.source()) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    tracing::warn!("Hash error for {}, uploading anyway: {}", file.key, e);
                    None
                }
            };
            Ok((prepared, digest))
        })
        .await
        .map_err(|e| SyncError::Internal(format!("transform task failed: {}", e)))?
    }

    async fn put_with_retry(&self, request: &PutObjectRequest) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.ctx.store.put_object(request).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.ctx.retries => {
                    let delay = self.ctx.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Upload of {} failed (attempt {}), retrying in {:?}: {}",
                        request.key,
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run `workers` upload workers to completion and sum their stats
///
/// Returns once `files` is drained and closed (or `cancel` fires) and every
/// worker has exited, at which point all changed-key senders are dropped.
pub async fn run_pool(
    workers: usize,
    ctx: Arc<UploadContext>,
    files: Receiver<LocalFile>,
    changed: Sender<String>,
    cancel: CancellationToken,
) -> Result<WorkerStats> {
    let handles: Vec<_> = (0..workers.max(1))
        .map(|id| {
            let worker = UploadWorker::new(id, Arc::clone(&ctx));
            tokio::spawn(worker.run(files.clone(), changed.clone(), cancel.clone()))
        })
        .collect();
    drop(files);
    drop(changed);

    let mut total = WorkerStats::default();
    let mut panicked = 0usize;
    for result in join_all(handles).await {
        match result {
            Ok(stats) => total.merge(stats),
            Err(e) => {
                tracing::error!("Upload worker died: {}", e);
                panicked += 1;
            }
        }
    }

    if panicked > 0 {
        return Err(SyncError::Internal(format!(
            "{} upload workers died",
            panicked
        )));
    }
    Ok(total)
}
