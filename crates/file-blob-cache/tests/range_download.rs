//! Enumerate a date range and pull every matching object through the cache

use blob_store::MemoryStore;
use file_blob_cache::{BlobCache, ByteSource, CacheConfig};
use futures::TryStreamExt;
use range_lister::{RangeLister, RangeQuery};
use std::sync::Arc;
use tempfile::tempdir;

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_page_size(3));
    for day in 1..=6 {
        for table in ["Wifiv4", "Dnsv2"] {
            let key = format!("network/2021/04/{:02}/1618105577372_{}.csv", day, table);
            store
                .put("cwru-data", &key, format!("{} rows for day {}", table, day).into_bytes())
                .await;
        }
    }
    store
}

async fn download_range(
    cache: &BlobCache,
    lister: &RangeLister<MemoryStore>,
    query: &RangeQuery,
) -> Vec<(String, Vec<u8>, bool)> {
    let objects: Vec<_> = lister.list(query).try_collect().await.unwrap();
    let mut downloaded = Vec::new();
    for object in objects {
        let identifier = object.identifier();
        let mut reader = cache.open(&identifier).await.unwrap();
        let hit = reader.is_hit();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        reader.close().await.unwrap();
        assert_eq!(data.len() as u64, object.size);
        downloaded.push((identifier, data, hit));
    }
    downloaded
}

#[tokio::test]
async fn test_second_pass_is_served_from_disk() {
    let dir = tempdir().unwrap();
    let store = seeded_store().await;
    let lister = RangeLister::new(store.clone());
    let cache = BlobCache::new(CacheConfig::new(dir.path()), store.clone())
        .await
        .unwrap();
    let query = RangeQuery::new("cwru-data/network/", "2021/04/02", "2021/04/04", 1, "Wifi").unwrap();

    let first = download_range(&cache, &lister, &query).await;
    let identifiers: Vec<&str> = first.iter().map(|(id, _, _)| id.as_str()).collect();
    assert_eq!(
        identifiers,
        vec![
            "cwru-data/network/2021/04/02/1618105577372_Wifiv4.csv",
            "cwru-data/network/2021/04/03/1618105577372_Wifiv4.csv",
            "cwru-data/network/2021/04/04/1618105577372_Wifiv4.csv",
        ]
    );
    assert!(first.iter().all(|(_, _, hit)| !hit));
    assert_eq!(first[1].1, b"Wifiv4 rows for day 3");
    assert_eq!(store.get_calls(), 3);

    let second = download_range(&cache, &lister, &query).await;
    assert!(second.iter().all(|(_, _, hit)| *hit));
    assert_eq!(
        second.iter().map(|(_, data, _)| data).collect::<Vec<_>>(),
        first.iter().map(|(_, data, _)| data).collect::<Vec<_>>()
    );
    assert_eq!(store.get_calls(), 3);

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 3);
}

#[tokio::test]
async fn test_range_larger_than_budget_keeps_newest() {
    let dir = tempdir().unwrap();
    let store = seeded_store().await;
    let lister = RangeLister::new(store.clone());
    // Each Wifi object is 21 bytes; room for two
    let config = CacheConfig::new(dir.path()).with_max_size(45);
    let cache = BlobCache::new(config, store.clone()).await.unwrap();
    let query = RangeQuery::new("cwru-data/network/", "2021/04/01", "2021/04/06", 1, "Wifi").unwrap();

    let downloaded = download_range(&cache, &lister, &query).await;
    assert_eq!(downloaded.len(), 6);

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 2);
    assert!(stats.total_size <= 45);
    assert_eq!(stats.evictions, 4);
    assert!(cache.contains("cwru-data/network/2021/04/06/1618105577372_Wifiv4.csv").await);
}
