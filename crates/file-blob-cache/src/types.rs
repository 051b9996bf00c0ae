//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata for a cached blob entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `bucket/key` of the remote object
    pub identifier: String,
    pub path: PathBuf,
    pub size: u64,
    pub last_access: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Configuration for a cache directory
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one file per cached object
    pub root: PathBuf,
    /// Maximum total size of cached files in bytes
    pub max_size: u64,
}

impl CacheConfig {
    pub const DEFAULT_MAX_SIZE: u64 = 10 * 1000 * 1000 * 1000; // 10GB

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_size: Self::DEFAULT_MAX_SIZE,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::new("/var/cache/blobs");
        assert_eq!(config.root, PathBuf::from("/var/cache/blobs"));
        assert_eq!(config.max_size, 10_000_000_000);

        let config = config.with_max_size(1024);
        assert_eq!(config.max_size, 1024);
    }

    #[test]
    fn test_cache_entry_serialization() {
        let entry = CacheEntry {
            identifier: "cwru-data/network/a.csv".to_string(),
            path: PathBuf::from("/cache/cwru-data%2Fnetwork%2Fa.csv"),
            size: 12345,
            last_access: Utc::now(),
            last_modified: Utc::now(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("cwru-data/network/a.csv"));
        assert!(json.contains("12345"));

        let deserialized: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.identifier, entry.identifier);
        assert_eq!(deserialized.size, entry.size);
    }
}
