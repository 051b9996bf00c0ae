//! In-memory index of cached files
//!
//! Only ever touched through the cache's mutex. Every mutation keeps
//! `total_size` equal to the sum of the indexed entry sizes.

use crate::error::{CacheError, Result};
use crate::naming::{self, TEMP_DIR};
use crate::types::CacheEntry;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Minutes a blocked eviction victim's access time is pushed forward
const BLOCKED_VICTIM_DEFERRAL_MINS: i64 = 2;

/// Held by a reader of a cached file; the entry can't be evicted while any exist
#[derive(Debug)]
pub struct EntryGuard(#[allow(dead_code)] Arc<()>);

struct Slot {
    entry: CacheEntry,
    pins: Arc<()>,
}

impl Slot {
    fn new(entry: CacheEntry) -> Self {
        Self {
            entry,
            pins: Arc::new(()),
        }
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.pins) > 1
    }
}

#[derive(Default)]
pub(crate) struct CacheIndex {
    entries: HashMap<String, Slot>,
    total_size: u64,
    /// Scratch files owned by downloads still streaming
    in_flight: HashSet<PathBuf>,
}

impl CacheIndex {
    /// Rebuild the index from the cache directory, discarding stray scratch files
    pub(crate) async fn load(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).await?;
        let temp_dir = root.join(TEMP_DIR);

        let mut index = Self::default();
        let mut found_temp = false;
        let mut dir = fs::read_dir(root).await?;
        while let Some(dir_entry) = dir.next_entry().await? {
            let file_type = dir_entry.file_type().await?;
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(file = ?file_name, "Ignoring non-UTF-8 file in cache root");
                continue;
            };

            if file_type.is_dir() && name == TEMP_DIR {
                found_temp = true;
                index.clear_temp(&temp_dir).await?;
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let Some(identifier) = naming::identifier_for(name) else {
                warn!(file = name, "Ignoring unrecognised file in cache root");
                continue;
            };

            let meta = dir_entry.metadata().await?;
            let last_modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let last_access = meta
                .accessed()
                .map(DateTime::<Utc>::from)
                .unwrap_or(last_modified);
            index.insert(CacheEntry {
                identifier,
                path: dir_entry.path(),
                size: meta.len(),
                last_access,
                last_modified,
            });
        }

        if !found_temp {
            fs::create_dir_all(&temp_dir).await?;
        }

        info!(
            root = ?root,
            entries = index.entries.len(),
            total_size = index.total_size,
            "Cache index loaded"
        );
        Ok(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.total_size
    }

    pub(crate) fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Record an access and pin the entry; returns its path
    pub(crate) fn lookup(&mut self, identifier: &str) -> Option<(PathBuf, EntryGuard)> {
        let slot = self.entries.get_mut(identifier)?;
        slot.entry.last_access = Utc::now();
        Some((
            slot.entry.path.clone(),
            EntryGuard(Arc::clone(&slot.pins)),
        ))
    }

    /// Insert an entry, replacing (and un-counting) any previous one
    pub(crate) fn insert(&mut self, entry: CacheEntry) {
        self.total_size += entry.size;
        if let Some(old) = self.entries.insert(entry.identifier.clone(), Slot::new(entry)) {
            self.total_size -= old.entry.size;
        }
    }

    /// Drop an entry whose file is already gone
    pub(crate) fn forget(&mut self, identifier: &str) {
        if let Some(slot) = self.entries.remove(identifier) {
            self.total_size -= slot.entry.size;
        }
    }

    pub(crate) fn track_download(&mut self, temp_path: PathBuf) {
        self.in_flight.insert(temp_path);
    }

    pub(crate) fn untrack_download(&mut self, temp_path: &Path) {
        self.in_flight.remove(temp_path);
    }

    /// Delete an entry's file and remove it; returns the bytes reclaimed
    pub(crate) async fn remove(&mut self, identifier: &str) -> Result<u64> {
        let Some(slot) = self.entries.get(identifier) else {
            return Ok(0);
        };
        if slot.in_use() {
            return Err(CacheError::EvictionBlocked {
                identifier: identifier.to_string(),
                reason: "open by a reader".to_string(),
            });
        }

        let path = slot.entry.path.clone();
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CacheError::EvictionBlocked {
                    identifier: identifier.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let size = self
            .entries
            .remove(identifier)
            .map(|slot| slot.entry.size)
            .unwrap_or(0);
        self.total_size -= size;
        Ok(size)
    }

    /// Evict least recently accessed entries until `total_size <= budget`.
    ///
    /// Entries that can't be deleted are skipped and have their access time
    /// pushed forward. Returns the number of entries evicted.
    pub(crate) async fn evict_to(&mut self, budget: u64) -> usize {
        if self.total_size <= budget {
            return 0;
        }

        let mut candidates: Vec<(DateTime<Utc>, String)> = self
            .entries
            .iter()
            .map(|(id, slot)| (slot.entry.last_access, id.clone()))
            .collect();
        candidates.sort();

        let mut evicted = 0;
        for (_, identifier) in candidates {
            if self.total_size <= budget {
                break;
            }
            match self.remove(&identifier).await {
                Ok(size) => {
                    evicted += 1;
                    debug!(identifier = %identifier, size, "Evicted least recently used entry");
                }
                Err(e) => {
                    warn!(error = %e, "Skipping eviction candidate");
                    if let Some(slot) = self.entries.get_mut(&identifier) {
                        slot.entry.last_access =
                            Utc::now() + Duration::minutes(BLOCKED_VICTIM_DEFERRAL_MINS);
                    }
                }
            }
        }

        if self.total_size > budget {
            warn!(
                total_size = self.total_size,
                budget, "Cache over budget with no evictable entries left"
            );
        }
        evicted
    }

    /// Remove entries last accessed before `horizon`; returns how many were removed
    pub(crate) async fn expire_older_than(&mut self, horizon: DateTime<Utc>) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.last_access < horizon)
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = 0;
        for identifier in stale {
            match self.remove(&identifier).await {
                Ok(_) => {
                    removed += 1;
                    debug!(identifier = %identifier, "Expired cache entry");
                }
                Err(e) => warn!(error = %e, "Could not expire cache entry"),
            }
        }
        removed
    }

    /// Delete scratch files not owned by a running download
    pub(crate) async fn clear_temp(&mut self, temp_dir: &Path) -> Result<usize> {
        let mut dir = match fs::read_dir(temp_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.in_flight.clear();
                fs::create_dir_all(temp_dir).await?;
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        let mut live = HashSet::new();
        while let Some(dir_entry) = dir.next_entry().await? {
            let path = dir_entry.path();
            if self.in_flight.contains(&path) {
                live.insert(path);
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => debug!(path = ?path, error = %e, "Could not remove scratch file"),
            }
        }
        // Downloads whose scratch file is already gone no longer need protecting
        self.in_flight = live;
        if removed > 0 {
            info!(removed, "Removed incomplete downloads");
        }
        Ok(removed)
    }
}
