//! The remote object store capability

use crate::error::Result;
use crate::source::RemoteSource;
use crate::types::ObjectPage;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

/// A bucketed blob store that can list and stream objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of objects under `prefix`, continuing after `continuation`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage>;

    /// Open a forward-only stream over the object's bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<RemoteSource>;
}

enum PageCursor {
    Start,
    Next(String),
    Done,
}

/// Lazily page through every object under `prefix`.
///
/// Pages are requested only as the stream is polled. The stream is not
/// restartable mid-listing; after an error it ends.
pub fn list_objects<'a, S>(
    store: &'a S,
    bucket: String,
    prefix: String,
) -> BoxStream<'a, Result<ObjectPage>>
where
    S: ObjectStore + ?Sized,
{
    stream::unfold(PageCursor::Start, move |cursor| {
        let bucket = bucket.clone();
        let prefix = prefix.clone();
        async move {
            let token = match cursor {
                PageCursor::Start => None,
                PageCursor::Next(token) => Some(token),
                PageCursor::Done => return None,
            };
            debug!(bucket = %bucket, prefix = %prefix, continuation = ?token, "Listing page");
            match store.list_page(&bucket, &prefix, token.as_deref()).await {
                Ok(page) => {
                    let next = match &page.next_continuation_token {
                        Some(token) => PageCursor::Next(token.clone()),
                        None => PageCursor::Done,
                    };
                    Some((Ok(page), next))
                }
                Err(e) => Some((Err(e), PageCursor::Done)),
            }
        }
    })
    .boxed()
}
