//! Remote inventory snapshot
//!
//! Built once per run from a full listing and frozen before any upload
//! starts; workers share it read-only.

use std::collections::HashMap;

use crate::cloud::ObjectStore;
use crate::error::{Result, SyncError};

/// Remote key to content digest, entity tag quotes removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInventory {
    digests: HashMap<String, String>,
}

impl RemoteInventory {
    /// Drain every page of the bucket listing
    ///
    /// Any store error is fatal: without a complete baseline nothing can be
    /// safely skipped.
    pub async fn fetch(store: &dyn ObjectStore, bucket: &str) -> Result<Self> {
        let mut digests = HashMap::new();
        let mut continuation = None;
        let mut pages = 0usize;

        loop {
            let page = store
                .list_objects(bucket, continuation.take())
                .await
                .map_err(|e| SyncError::Inventory(e.to_string()))?;
            pages += 1;

            for object in page.objects {
                digests.insert(object.key, normalize_etag(&object.etag).to_string());
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::info!(
            "Fetched inventory of s3://{}: {} objects in {} pages",
            bucket,
            digests.len(),
            pages
        );
        Ok(Self { digests })
    }

    pub fn digest(&self, key: &str) -> Option<&str> {
        self.digests.get(key).map(String::as_str)
    }

    /// True when the stored digest for `key` equals `digest`
    pub fn matches(&self, key: &str, digest: &str) -> bool {
        self.digest(key) == Some(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl FromIterator<(String, String)> for RemoteInventory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            digests: iter.into_iter().collect(),
        }
    }
}

/// Strip exactly one leading and one trailing character
///
/// Entity tags arrive wrapped in quotes. Anything shorter than two
/// characters normalizes to the empty string.
pub fn normalize_etag(etag: &str) -> &str {
    let mut chars = etag.chars();
    if chars.next().is_none() || chars.next_back().is_none() {
        return "";
    }
    chars.as_str()
}
