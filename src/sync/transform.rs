//! Per-file transform: compression and content classification
//!
//! A file is gzip-compressed into a scoped temp file unless its extension
//! marks an already-compressed format or it is too small to benefit. The
//! temp file lives exactly as long as the [`PreparedUpload`] that owns it,
//! so it is removed on every exit path of the upload.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use super::mime::{sniff_file, DEFAULT_CONTENT_TYPES};
use crate::error::{Result, SyncError};
use crate::types::LocalFile;

/// Files at or below this size are uploaded as-is
pub const DEFAULT_COMPRESS_THRESHOLD: u64 = 500;

/// Extensions of formats that do not shrink under gzip
pub const DEFAULT_COMPRESS_BLACKLIST: &[&str] = &["gif", "jpg", "png", "jpeg", "psd", "ai"];

pub const GZIP_ENCODING: &str = "gzip";

/// Immutable compression and classification tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformPolicy {
    pub compress_threshold: u64,
    pub compress_blacklist: BTreeSet<String>,
    /// Lowercase extension (no dot) to media type
    pub content_types: BTreeMap<String, String>,
    /// Where gzip output goes; system temp dir when unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransformPolicy {
    fn default() -> Self {
        Self {
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
            compress_blacklist: DEFAULT_COMPRESS_BLACKLIST
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            content_types: DEFAULT_CONTENT_TYPES
                .iter()
                .map(|(ext, content_type)| (ext.to_string(), content_type.to_string()))
                .collect(),
            temp_dir: None,
        }
    }
}

impl TransformPolicy {
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.compress_threshold = threshold;
        self
    }

    /// Whether a file of this extension and size gets gzipped
    pub fn should_compress(&self, ext: Option<&str>, size: u64) -> bool {
        let blacklisted = ext.is_some_and(|ext| self.compress_blacklist.contains(ext));
        !blacklisted && size > self.compress_threshold
    }

    /// Media type from the extension table, if known
    pub fn content_type(&self, ext: Option<&str>) -> Option<String> {
        self.content_types.get(ext?).cloned()
    }

    /// Decide compression and content type for a file
    ///
    /// Classification always reads the original bytes, never the gzip.
    pub fn prepare(&self, file: &LocalFile) -> Result<PreparedUpload> {
        let ext = extension(&file.path);

        let content_type = match self.content_type(ext.as_deref()) {
            Some(content_type) => content_type,
            None => {
                let sniffed = sniff_file(&file.path).map_err(|e| transform_error(file, e))?;
                tracing::debug!("Detected {} for {}", sniffed, file.key);
                sniffed.to_string()
            }
        };

        let compressed = if self.should_compress(ext.as_deref(), file.size) {
            tracing::debug!("Compressing {}", file.path.display());
            let temp = gzip_to_temp(&file.path, self.temp_dir.as_deref())
                .map_err(|e| transform_error(file, e.into()))?;
            Some(temp)
        } else {
            None
        };

        Ok(PreparedUpload {
            original: file.path.clone(),
            content_encoding: compressed.as_ref().map(|_| GZIP_ENCODING.to_string()),
            compressed,
            content_type,
        })
    }
}

/// The bytes to upload for one file and how to describe them
#[derive(Debug)]
pub struct PreparedUpload {
    original: PathBuf,
    /// Deleted when dropped
    compressed: Option<TempPath>,
    pub content_encoding: Option<String>,
    pub content_type: String,
}

impl PreparedUpload {
    /// File whose bytes are uploaded and hashed
    pub fn source(&self) -> &Path {
        self.compressed.as_deref().unwrap_or(self.original.as_path())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }
}

/// Lowercase extension without the dot
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn gzip_to_temp(path: &Path, temp_dir: Option<&Path>) -> io::Result<TempPath> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("sitesync-").suffix(".gz");
    let temp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let (file, temp_path) = temp.into_parts();

    let mut input = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;

    Ok(temp_path)
}

fn transform_error(file: &LocalFile, err: SyncError) -> SyncError {
    SyncError::Transform {
        path: file.path.display().to_string(),
        message: err.to_string(),
    }
}
