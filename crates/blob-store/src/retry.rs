//! Retry policy for transient store failures

use crate::error::Result;
use crate::source::RemoteSource;
use crate::store::ObjectStore;
use crate::types::ObjectPage;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0usize;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        "{} failed, retrying in {:?} (attempt {}/{})",
                        what, delay, attempt, self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps a store so listing and opening objects retry transient failures.
///
/// Bytes already streaming from an opened object are not retried.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage> {
        self.policy
            .run("list_page", || self.inner.list_page(bucket, prefix, continuation))
            .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<RemoteSource> {
        self.policy
            .run("get_object", || self.inner.get_object(bucket, key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls of each operation with the given error kind
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
        transient: bool,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn fail(&self) -> Option<StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Some(if self.transient {
                    StoreError::Transient("connection reset".to_string())
                } else {
                    StoreError::not_found("bucket", "key")
                })
            } else {
                None
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            continuation: Option<&str>,
        ) -> Result<ObjectPage> {
            match self.fail() {
                Some(e) => Err(e),
                None => self.inner.list_page(bucket, prefix, continuation).await,
            }
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<RemoteSource> {
            match self.fail() {
                Some(e) => Err(e),
                None => self.inner.get_object(bucket, key).await,
            }
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff_ms: 1,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let inner = MemoryStore::new();
        inner.put("bucket", "key", b"data".to_vec()).await;
        let flaky = FlakyStore {
            inner,
            failures: 2,
            transient: true,
            calls: AtomicUsize::new(0),
        };
        let store = RetryingStore::new(flaky, fast_policy(5));

        assert!(store.get_object("bucket", "key").await.is_ok());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let flaky = FlakyStore {
            inner: MemoryStore::new(),
            failures: 10,
            transient: true,
            calls: AtomicUsize::new(0),
        };
        let store = RetryingStore::new(flaky, fast_policy(3));

        let result = store.list_page("bucket", "", None).await;
        assert!(matches!(result, Err(StoreError::Transient(_))));
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let flaky = FlakyStore {
            inner: MemoryStore::new(),
            failures: 1,
            transient: false,
            calls: AtomicUsize::new(0),
        };
        let store = RetryingStore::new(flaky, fast_policy(5));

        let result = store.get_object("bucket", "key").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
    }
}
