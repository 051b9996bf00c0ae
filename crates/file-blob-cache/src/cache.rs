//! Cache front: lookups, misses, finalize and maintenance

use crate::error::Result;
use crate::index::CacheIndex;
use crate::naming::{self, TEMP_DIR};
use crate::reader::{CachedReader, FileReader, RemoteReader, TeeReader};
use crate::types::{CacheConfig, CacheEntry, CacheStats};
use blob_store::{ByteSource, ObjectStore};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// State shared by the cache handle and its outstanding readers
pub(crate) struct Shared {
    root: PathBuf,
    temp_dir: PathBuf,
    max_size: u64,
    index: Mutex<CacheIndex>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Shared {
    async fn load(config: &CacheConfig) -> Result<Self> {
        let index = CacheIndex::load(&config.root).await?;
        Ok(Self {
            root: config.root.clone(),
            temp_dir: config.root.join(TEMP_DIR),
            max_size: config.max_size,
            index: Mutex::new(index),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Move a completed download into the cache, register it and enforce the budget
    pub(crate) async fn finalize(&self, identifier: &str, temp_path: &Path) -> Result<()> {
        let mut index = self.index.lock().await;
        index.untrack_download(temp_path);

        let path = self.root.join(naming::file_name_for(identifier));
        if let Err(e) = fs::rename(temp_path, &path).await {
            let _ = fs::remove_file(temp_path).await;
            return Err(e.into());
        }
        let meta = fs::metadata(&path).await?;
        let now = Utc::now();
        let size = meta.len();
        index.insert(CacheEntry {
            identifier: identifier.to_string(),
            path,
            size,
            last_access: now,
            last_modified: meta.modified().map(DateTime::<Utc>::from).unwrap_or(now),
        });
        debug!(identifier = %identifier, size, "Cached blob");

        let evicted = index.evict_to(self.max_size).await;
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) async fn untrack_download(&self, temp_path: &Path) {
        self.index.lock().await.untrack_download(temp_path);
    }

    /// Untrack from a synchronous context, deferring to the runtime if the lock is busy
    pub(crate) fn untrack_download_now(self: &Arc<Self>, temp_path: &Path) {
        if let Ok(mut index) = self.index.try_lock() {
            index.untrack_download(temp_path);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(self);
            let temp_path = temp_path.to_path_buf();
            handle.spawn(async move {
                shared.untrack_download(&temp_path).await;
            });
            return;
        }
        // Pruned by the next clear_temp, since the file itself is gone
        debug!(path = ?temp_path, "No runtime to untrack scratch file");
    }

    async fn expire(&self, max_age_days: Option<u32>, max_total_bytes: Option<u64>) -> Result<bool> {
        let mut index = self.index.lock().await;

        let expired = match max_age_days {
            Some(days) => {
                let horizon = Utc::now() - Duration::days(i64::from(days));
                index.expire_older_than(horizon).await
            }
            None => 0,
        };
        let scratch = index.clear_temp(&self.temp_dir).await?;
        let evicted = match max_total_bytes {
            Some(budget) => index.evict_to(budget).await,
            None => 0,
        };
        self.evictions
            .fetch_add((expired + evicted) as u64, Ordering::Relaxed);

        let satisfied = max_total_bytes.map_or(true, |budget| index.total_size() <= budget);
        info!(
            expired,
            evicted,
            scratch,
            entries = index.len(),
            total_size = index.total_size(),
            satisfied,
            "Cache maintenance finished"
        );
        Ok(satisfied)
    }
}

/// A size-bounded local cache in front of an [`ObjectStore`]
#[derive(Clone)]
pub struct BlobCache {
    shared: Arc<Shared>,
    store: Arc<dyn ObjectStore>,
}

impl BlobCache {
    /// Open (or create) the cache directory and index its contents
    pub async fn new(config: CacheConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let shared = Shared::load(&config).await?;
        Ok(Self {
            shared: Arc::new(shared),
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Open `bucket/key` for reading, from disk when cached
    pub async fn open(&self, identifier: &str) -> Result<CachedReader> {
        self.open_with(identifier, true).await
    }

    /// Like [`open`](Self::open). With `write_cache` false a miss streams
    /// straight from the store and leaves the cache untouched.
    pub async fn open_with(&self, identifier: &str, write_cache: bool) -> Result<CachedReader> {
        let (bucket, key) = naming::split_identifier(identifier)?;

        if let Some(reader) = self.open_cached(identifier).await? {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            debug!(identifier = %identifier, "Cache hit");
            return Ok(CachedReader::Hit(reader));
        }

        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        debug!(identifier = %identifier, "Cache miss");
        let mut remote = self.store.get_object(bucket, key).await?;
        if !write_cache {
            return Ok(CachedReader::Uncached(RemoteReader::new(identifier, remote)));
        }

        let temp_path = self
            .shared
            .temp_dir
            .join(naming::temp_file_name(identifier));
        let created = {
            let mut index = self.shared.index.lock().await;
            let created = fs::File::create(&temp_path).await;
            if created.is_ok() {
                index.track_download(temp_path.clone());
            }
            created
        };
        let temp = match created {
            Ok(file) => file,
            Err(e) => {
                let _ = remote.close().await;
                return Err(e.into());
            }
        };

        Ok(CachedReader::Miss(TeeReader::new(
            identifier,
            remote,
            temp,
            temp_path,
            Arc::clone(&self.shared),
        )))
    }

    async fn open_cached(&self, identifier: &str) -> Result<Option<FileReader>> {
        let Some((path, guard)) = self.shared.index.lock().await.lookup(identifier) else {
            return Ok(None);
        };

        let opened = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)?;
            let times = std::fs::FileTimes::new().set_accessed(SystemTime::now());
            if let Err(e) = file.set_times(times) {
                debug!(path = ?path, error = %e, "Could not update access time");
            }
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(std::io::Error::other)?;

        match opened {
            Ok(file) => Ok(Some(FileReader::new(
                identifier,
                fs::File::from_std(file),
                guard,
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(identifier = %identifier, "Cached file vanished, refetching");
                drop(guard);
                self.shared.index.lock().await.forget(identifier);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Expire entries older than `max_age_days`, clear stale scratch files and
    /// evict down to `max_total_bytes`. Returns whether the size limit holds.
    pub async fn expire(
        &self,
        max_age_days: Option<u32>,
        max_total_bytes: Option<u64>,
    ) -> Result<bool> {
        self.shared.expire(max_age_days, max_total_bytes).await
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        self.shared.index.lock().await.contains(identifier)
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.shared.index.lock().await;
        CacheStats {
            entries: index.len(),
            total_size: index.total_size(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            evictions: self.shared.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Run [`BlobCache::expire`] against a cache directory without a store.
///
/// Clears every scratch file, so no other process may be downloading into
/// the same directory.
pub async fn expire_dir(
    config: &CacheConfig,
    max_age_days: Option<u32>,
    max_total_bytes: Option<u64>,
) -> Result<bool> {
    let shared = Shared::load(config).await?;
    shared.expire(max_age_days, max_total_bytes).await
}
