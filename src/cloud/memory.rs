//! In-memory object store and CDN
//!
//! These mirror the observable behavior of S3 and CloudFront closely enough
//! for the engine: etags are the quoted MD5 of the stored body, listings are
//! key-ordered and paginated, invalidations are recorded instead of sent.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CdnClient, ObjectStore};
use crate::error::{Result, SyncError};
use crate::sync::hasher::digest_bytes;
use crate::types::{Distribution, DistributionPage, ObjectPage, PutObjectRequest, RemoteObject};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    /// Quoted entity tag, as a real store would report it
    pub etag: String,
    pub cache_control: Option<String>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
    pub acl: Option<String>,
}

#[derive(Default)]
struct StoreState {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    puts: Vec<String>,
    list_calls: usize,
    fail_listing: bool,
    /// Keys whose uploads fail; `Some(n)` fails the next n attempts
    /// with a retryable error, `None` fails forever.
    failing_keys: HashMap<String, Option<u32>>,
}

/// Object store kept entirely in memory
pub struct MemoryStore {
    state: Mutex<StoreState>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Store whose listings return at most `page_size` objects per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            page_size: page_size.max(1),
        }
    }

    /// Seed an object with the given body
    pub fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
        self.insert_with_etag(bucket, key, &format!("\"{}\"", digest_bytes(body)));
    }

    /// Seed an object by its raw entity tag, body left empty
    pub fn insert_with_etag(&self, bucket: &str, key: &str, etag: &str) {
        let mut state = self.state.lock();
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body: Vec::new(),
                etag: etag.to_string(),
                cache_control: None,
                content_encoding: None,
                content_type: None,
                acl: None,
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock();
        state.buckets.get(bucket)?.get(key).cloned()
    }

    /// All keys in a bucket with their quoted etags
    pub fn snapshot(&self, bucket: &str) -> BTreeMap<String, String> {
        let state = self.state.lock();
        state
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, object)| (key.clone(), object.etag.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys of successful puts, in order
    pub fn puts(&self) -> Vec<String> {
        self.state.lock().puts.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Make every listing call fail
    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    /// Make every upload of `key` fail with a permanent error
    pub fn fail_uploads_of(&self, key: &str) {
        self.state.lock().failing_keys.insert(key.to_string(), None);
    }

    /// Make the next `attempts` uploads of `key` fail with a retryable error
    pub fn fail_next_uploads_of(&self, key: &str, attempts: u32) {
        self.state
            .lock()
            .failing_keys
            .insert(key.to_string(), Some(attempts));
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(SyncError::Store("listing unavailable".to_string()));
        }

        let Some(objects) = state.buckets.get(bucket) else {
            return Ok(ObjectPage::default());
        };

        let remaining: Vec<(&String, &StoredObject)> = match &continuation {
            Some(after) => objects
                .range::<String, _>((
                    std::ops::Bound::Excluded(after),
                    std::ops::Bound::Unbounded,
                ))
                .collect(),
            None => objects.iter().collect(),
        };

        let page: Vec<RemoteObject> = remaining
            .iter()
            .take(self.page_size)
            .map(|(key, object)| RemoteObject {
                key: (*key).clone(),
                etag: object.etag.clone(),
            })
            .collect();

        let next = if remaining.len() > self.page_size {
            page.last().map(|object| object.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            next,
        })
    }

    async fn put_object(&self, request: &PutObjectRequest) -> Result<()> {
        {
            let mut state = self.state.lock();
            if let Some(failure) = state.failing_keys.get_mut(&request.key) {
                match failure {
                    None => {
                        return Err(SyncError::Upload {
                            key: request.key.clone(),
                            message: "access denied".to_string(),
                            retryable: false,
                        })
                    }
                    Some(0) => {}
                    Some(left) => {
                        *left -= 1;
                        return Err(SyncError::Upload {
                            key: request.key.clone(),
                            message: "service unavailable".to_string(),
                            retryable: true,
                        });
                    }
                }
            }
        }

        let body = tokio::fs::read(&request.source).await?;
        let etag = format!("\"{}\"", digest_bytes(&body));

        let mut state = self.state.lock();
        state
            .buckets
            .entry(request.bucket.clone())
            .or_default()
            .insert(
                request.key.clone(),
                StoredObject {
                    body,
                    etag,
                    cache_control: Some(request.cache_control.clone()),
                    content_encoding: request.content_encoding.clone(),
                    content_type: Some(request.content_type.clone()),
                    acl: Some(request.acl.clone()),
                },
            );
        state.puts.push(request.key.clone());
        Ok(())
    }
}

/// An invalidation captured by [`MemoryCdn`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvalidation {
    pub id: String,
    pub distribution_id: String,
    pub caller_reference: String,
    pub paths: Vec<String>,
}

#[derive(Default)]
struct CdnState {
    list_calls: usize,
    invalidations: Vec<RecordedInvalidation>,
    fail_invalidations: bool,
}

/// CDN that records invalidations in memory
pub struct MemoryCdn {
    distributions: Vec<Distribution>,
    page_size: usize,
    state: Mutex<CdnState>,
}

impl MemoryCdn {
    pub fn new(distributions: Vec<Distribution>) -> Self {
        Self::with_page_size(distributions, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(distributions: Vec<Distribution>, page_size: usize) -> Self {
        Self {
            distributions,
            page_size: page_size.max(1),
            state: Mutex::new(CdnState::default()),
        }
    }

    /// CDN with one distribution serving `domain`
    pub fn serving(distribution_id: &str, domain: &str) -> Self {
        Self::new(vec![Distribution {
            id: distribution_id.to_string(),
            aliases: vec![domain.to_string()],
        }])
    }

    pub fn invalidations(&self) -> Vec<RecordedInvalidation> {
        self.state.lock().invalidations.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn fail_invalidations(&self, fail: bool) {
        self.state.lock().fail_invalidations = fail;
    }
}

#[async_trait]
impl CdnClient for MemoryCdn {
    async fn list_distributions(&self, marker: Option<String>) -> Result<DistributionPage> {
        self.state.lock().list_calls += 1;

        let start = match marker {
            Some(marker) => marker
                .parse::<usize>()
                .map_err(|_| SyncError::Cdn(format!("bad marker: {}", marker)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(self.distributions.len());
        let distributions = self.distributions.get(start..end).unwrap_or_default().to_vec();
        let next = (end < self.distributions.len()).then(|| end.to_string());

        Ok(DistributionPage {
            distributions,
            next,
        })
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[String],
    ) -> Result<String> {
        let mut state = self.state.lock();
        if state.fail_invalidations {
            return Err(SyncError::Cdn("invalidation rejected".to_string()));
        }
        if let Some(bad) = paths.iter().find(|path| !path.starts_with('/')) {
            return Err(SyncError::Cdn(format!("path must start with '/': {}", bad)));
        }
        if state
            .invalidations
            .iter()
            .any(|recorded| recorded.caller_reference == caller_reference)
        {
            return Err(SyncError::Cdn(format!(
                "caller reference reused: {}",
                caller_reference
            )));
        }

        let id = format!("I{}", state.invalidations.len() + 1);
        state.invalidations.push(RecordedInvalidation {
            id: id.clone(),
            distribution_id: distribution_id.to_string(),
            caller_reference: caller_reference.to_string(),
            paths: paths.to_vec(),
        });
        Ok(id)
    }
}
