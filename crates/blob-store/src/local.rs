//! Object store backed by a local directory tree
//!
//! Each bucket is a subdirectory of the root; keys are `/`-separated paths
//! relative to the bucket directory.

use crate::error::{Result, StoreError};
use crate::source::{ReaderSource, RemoteSource};
use crate::store::ObjectStore;
use crate::types::{ObjectPage, RemoteObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 1000;

pub struct LocalDirStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalDirStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn object_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if bucket.is_empty() || bucket.contains('/') || key.is_empty() || !safe {
            return None;
        }
        Some(self.root.join(bucket).join(relative))
    }

    /// All keys under `prefix`, sorted
    async fn collect_keys(&self, bucket_dir: &Path, prefix: &str) -> Result<Vec<String>> {
        // Only the directory named by the prefix's complete components can hold matches
        let start = match prefix.rfind('/') {
            Some(i) => bucket_dir.join(&prefix[..i]),
            None => bucket_dir.to_path_buf(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = relative_key(bucket_dir, &path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn relative_key(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn weak_etag(key: &str, size: u64, modified_nanos: u128) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", key, size, modified_nanos).as_bytes());
    format!("W/\"{}\"", &hex::encode(digest)[..32])
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage> {
        let bucket_dir = self.root.join(bucket);
        if !fs::try_exists(&bucket_dir).await? {
            return Err(StoreError::not_found(bucket, prefix));
        }

        let keys = self.collect_keys(&bucket_dir, prefix).await?;
        let remaining: Vec<String> = match continuation {
            Some(after) => keys.into_iter().filter(|k| k.as_str() > after).collect(),
            None => keys,
        };

        let mut page = ObjectPage::default();
        for key in remaining.iter().take(self.page_size) {
            let meta = match fs::metadata(bucket_dir.join(key)).await {
                Ok(meta) => meta,
                // Deleted between the walk and the stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified = meta.modified()?;
            let nanos = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            page.objects.push(RemoteObject {
                bucket: bucket.to_string(),
                key: key.clone(),
                size: meta.len(),
                last_modified: DateTime::<Utc>::from(modified),
                etag: weak_etag(key, meta.len(), nanos),
                storage_class: "STANDARD".to_string(),
                owner: None,
            });
        }
        if remaining.len() > self.page_size {
            page.next_continuation_token = remaining.get(self.page_size - 1).cloned();
        }

        debug!(bucket, prefix, count = page.objects.len(), "Listed local page");
        Ok(page)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<RemoteSource> {
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(ReaderSource::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::not_found(bucket, key))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteSource;
    use tempfile::tempdir;

    async fn write(root: &Path, bucket: &str, key: &str, data: &[u8]) {
        let path = root.join(bucket).join(key);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, data).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_page_returns_sorted_keys_under_prefix() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bucket", "p/2021/04/02/2_Tablev4.csv", b"two").await;
        write(dir.path(), "bucket", "p/2021/03/30/1_Tablev4.csv", b"one").await;
        write(dir.path(), "bucket", "q/other.csv", b"q").await;

        let store = LocalDirStore::new(dir.path().to_path_buf());
        let page = store.list_page("bucket", "p/2021", None).await.unwrap();
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["p/2021/03/30/1_Tablev4.csv", "p/2021/04/02/2_Tablev4.csv"]
        );
        assert_eq!(page.objects[0].size, 3);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_list_page_paginates() {
        let dir = tempdir().unwrap();
        for name in ["a", "b", "c"] {
            write(dir.path(), "bucket", name, b"x").await;
        }
        let store = LocalDirStore::new(dir.path().to_path_buf()).with_page_size(2);

        let first = store.list_page("bucket", "", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_continuation_token.as_deref(), Some("b"));

        let second = store.list_page("bucket", "", Some("b")).await.unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "c");
    }

    #[tokio::test]
    async fn test_missing_bucket_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalDirStore::new(dir.path().to_path_buf());
        let result = store.list_page("nope", "", None).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_object_streams_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bucket", "a/b/c.csv", b"payload").await;
        let store = LocalDirStore::new(dir.path().to_path_buf());

        let mut source = store.get_object("bucket", "a/b/c.csv").await.unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"payload");
    }

    #[tokio::test]
    async fn test_get_object_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = LocalDirStore::new(dir.path().to_path_buf());
        let result = store.get_object("bucket", "../secret").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
