//! Local directory enumeration
//!
//! Walks the sync root on a blocking thread and feeds [`LocalFile`]s into a
//! bounded channel. A full channel blocks the walk, which keeps it paced to
//! the upload workers.

use std::path::{Component, Path, PathBuf};

use async_channel::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, SyncError};
use crate::types::LocalFile;

/// Synchronization key for `path` under `root`
///
/// Strips the root prefix and joins the remaining components with `/`.
/// Returns `None` for the root itself, paths outside it, and paths that
/// are not valid UTF-8 (no lossless key exists for them).
pub fn sync_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().as_encoded_bytes().first() == Some(&b'.')
}

/// Walk `root`, sending every visible regular file
///
/// Hidden entries are skipped and hidden directories pruned. Stops early
/// when `cancel` fires or every receiver is gone. Returns the number of
/// files sent; any walk error aborts the walk.
pub fn enumerate(
    root: &Path,
    follow_links: bool,
    sender: &Sender<LocalFile>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut sent = 0u64;

    let walker = WalkDir::new(root)
        .follow_links(follow_links)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|e| SyncError::Walk(e.to_string()))?;

        if !entry.file_type().is_file() {
            if entry.file_type().is_symlink() {
                tracing::debug!("Skipping symlink {}", entry.path().display());
            }
            continue;
        }

        let Some(key) = sync_key(root, entry.path()) else {
            tracing::warn!(
                "Skipping {}: path is not valid UTF-8",
                entry.path().display()
            );
            continue;
        };
        let metadata = entry
            .metadata()
            .map_err(|e| SyncError::Walk(e.to_string()))?;

        if cancel.is_cancelled() {
            tracing::info!("Enumeration cancelled after {} files", sent);
            break;
        }

        let file = LocalFile {
            path: entry.into_path(),
            key,
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        };

        if sender.send_blocking(file).is_err() {
            tracing::debug!("File queue closed, stopping walk");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

/// Run [`enumerate`] on the blocking pool
///
/// The sender is dropped when the walk ends, closing the channel.
pub fn spawn_enumerator(
    root: PathBuf,
    follow_links: bool,
    sender: Sender<LocalFile>,
    cancel: CancellationToken,
) -> JoinHandle<Result<u64>> {
    tokio::task::spawn_blocking(move || {
        if !root.is_dir() {
            return Err(SyncError::Walk(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let result = enumerate(&root, follow_links, &sender, &cancel);
        sender.close();
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn collect(root: &Path) -> Vec<String> {
        let (sender, receiver) = async_channel::unbounded();
        enumerate(root, false, &sender, &CancellationToken::new()).unwrap();
        drop(sender);
        let mut keys: Vec<String> = std::iter::from_fn(|| receiver.try_recv().ok())
            .map(|file| file.key)
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "[core]").unwrap();
        fs::write(root.join(".hidden"), "secret").unwrap();
        fs::write(root.join("visible.txt"), "hello").unwrap();

        assert_eq!(collect(root), vec!["visible.txt".to_string()]);
    }

    #[test]
    fn test_nested_keys_use_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("assets/css")).unwrap();
        fs::create_dir_all(root.join("assets/.cache/deep")).unwrap();
        fs::write(root.join("assets/css/site.css"), "a{}").unwrap();
        fs::write(root.join("assets/.cache/deep/x"), "x").unwrap();
        fs::write(root.join("index.html"), "<p>").unwrap();

        assert_eq!(
            collect(root),
            vec!["assets/css/site.css".to_string(), "index.html".to_string()]
        );
    }

    #[test]
    fn test_file_metadata_recorded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 1234]).unwrap();

        let (sender, receiver) = async_channel::unbounded();
        let sent = enumerate(dir.path(), false, &sender, &CancellationToken::new()).unwrap();
        assert_eq!(sent, 1);
        let file = receiver.try_recv().unwrap();
        assert_eq!(file.size, 1234);
        assert!(!file.is_dir);
        assert_eq!(file.path, dir.path().join("a.bin"));
    }

    #[test]
    fn test_cancelled_walk_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (sender, receiver) = async_channel::unbounded();
        assert_eq!(enumerate(dir.path(), false, &sender, &cancel).unwrap(), 0);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_sync_key() {
        let root = Path::new("/srv/site");
        assert_eq!(
            sync_key(root, Path::new("/srv/site/a/b.txt")),
            Some("a/b.txt".to_string())
        );
        assert_eq!(sync_key(root, Path::new("/srv/site")), None);
        assert_eq!(sync_key(root, Path::new("/elsewhere/b.txt")), None);
    }

    // APFS rejects non-UTF-8 names
    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(OsStr::from_bytes(b".secret\xff")), "s").unwrap();
        let hidden_dir = root.join(OsStr::from_bytes(b".cache\xfe"));
        fs::create_dir(&hidden_dir).unwrap();
        fs::write(hidden_dir.join("inner.txt"), "i").unwrap();
        fs::write(root.join(OsStr::from_bytes(b"bad\xff.txt")), "b").unwrap();
        fs::write(root.join(OsStr::from_bytes(b"bad\xfe.txt")), "b").unwrap();
        fs::write(root.join("visible.txt"), "v").unwrap();

        assert_eq!(collect(root), vec!["visible.txt".to_string()]);
        assert_eq!(
            sync_key(root, &root.join(OsStr::from_bytes(b"bad\xff.txt"))),
            None
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, _receiver) = async_channel::bounded(4);
        let handle = spawn_enumerator(
            dir.path().join("missing"),
            false,
            sender,
            CancellationToken::new(),
        );
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SyncError::Walk(_))));
    }
}
