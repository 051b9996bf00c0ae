//! Streaming range lister

use crate::error::Result;
use crate::query::{KeyMatch, RangeQuery};
use blob_store::{list_objects, ObjectPage, ObjectStore, RemoteObject};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Lists remote objects that fall inside a [`RangeQuery`]
pub struct RangeLister<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for RangeLister<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

struct ListState<'a> {
    pages: BoxStream<'a, blob_store::Result<ObjectPage>>,
    pending: std::vec::IntoIter<RemoteObject>,
    query: &'a RangeQuery,
    ignored: usize,
    yielded: usize,
}

impl<S> RangeLister<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stream the objects matching `query`.
    ///
    /// Pages are fetched lazily. Keys that don't follow the expected form are
    /// logged and skipped. A store error is yielded once and ends the stream.
    pub fn list<'a>(&'a self, query: &'a RangeQuery) -> BoxStream<'a, Result<RemoteObject>> {
        debug!(
            bucket = query.bucket(),
            listing_prefix = query.listing_prefix(),
            range_min = query.range_min(),
            range_max = query.range_max(),
            "Listing range"
        );

        let state = ListState {
            pages: list_objects(
                self.store.as_ref(),
                query.bucket().to_string(),
                query.listing_prefix().to_string(),
            ),
            pending: Vec::new().into_iter(),
            query,
            ignored: 0,
            yielded: 0,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(object) = state.pending.next() {
                    match state.query.check(&object.key) {
                        KeyMatch::Accepted => {
                            state.yielded += 1;
                            return Some((Ok(object), state));
                        }
                        KeyMatch::Rejected => continue,
                        KeyMatch::Malformed => {
                            state.ignored += 1;
                            warn!(key = %object.key, "Key doesn't match expected form, ignored");
                            continue;
                        }
                    }
                }

                match state.pages.next().await {
                    Some(Ok(page)) => state.pending = page.objects.into_iter(),
                    Some(Err(e)) => {
                        error!(error = %e, bucket = state.query.bucket(), "Range listing failed");
                        return Some((Err(e.into()), state));
                    }
                    None => {
                        debug!(
                            yielded = state.yielded,
                            ignored = state.ignored,
                            "Range listing complete"
                        );
                        return None;
                    }
                }
            }
        })
        .boxed()
    }
}
