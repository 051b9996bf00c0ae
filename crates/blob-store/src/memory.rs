//! In-memory object store
//!
//! Keeps objects in sorted maps so listings come back in key order like a
//! real bucket listing. Call counters make it useful for asserting how many
//! round trips a consumer made.

use crate::error::{Result, StoreError};
use crate::source::{ReaderSource, RemoteSource};
use crate::store::ObjectStore;
use crate::types::{ObjectPage, RemoteObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 1000;

struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
    etag: String,
}

/// An object store held entirely in memory
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    page_size: usize,
    list_calls: AtomicU64,
    get_calls: AtomicU64,
    listed_prefixes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that returns at most `page_size` objects per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            list_calls: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
            listed_prefixes: Mutex::new(Vec::new()),
        }
    }

    /// Store (or replace) an object
    pub async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let etag = format!("\"{}\"", &hex::encode(Sha256::digest(&data))[..32]);
        let object = StoredObject {
            data,
            last_modified: Utc::now(),
            etag,
        };
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    /// Remove an object, returning whether it existed
    pub async fn remove(&self, bucket: &str, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        buckets
            .get_mut(bucket)
            .map(|objects| objects.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Number of `list_page` calls served so far
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `get_object` calls served so far
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Prefixes passed to `list_page`, in call order
    pub async fn listed_prefixes(&self) -> Vec<String> {
        self.listed_prefixes.lock().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.listed_prefixes.lock().await.push(prefix.to_string());

        let buckets = self.buckets.read().await;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(ObjectPage::default());
        };

        let lower = match continuation {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));

        let mut page = ObjectPage::default();
        for (key, object) in matching.by_ref().take(self.page_size) {
            page.objects.push(RemoteObject {
                bucket: bucket.to_string(),
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: object.last_modified,
                etag: object.etag.clone(),
                storage_class: "STANDARD".to_string(),
                owner: None,
            });
        }
        if matching.next().is_some() {
            page.next_continuation_token = page.objects.last().map(|o| o.key.clone());
        }

        debug!(bucket, prefix, count = page.objects.len(), "Listed in-memory page");
        Ok(page)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<RemoteSource> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let buckets = self.buckets.read().await;
        let object = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        Ok(Box::new(ReaderSource::new(Cursor::new(object.data.clone()))))
    }
}
