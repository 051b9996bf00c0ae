//! Write-through file cache for remote blobs with LRU eviction
//!
//! Serves objects from a local directory when present. On a miss the remote
//! object is streamed to the caller while the same bytes are written to a
//! scratch file, which is renamed into the cache once the stream is complete.
//! Total size is bounded by least-recently-accessed eviction.

mod cache;
mod error;
mod index;
mod naming;
mod reader;
mod types;

pub use blob_store::ByteSource;
pub use cache::{expire_dir, BlobCache};
pub use error::{CacheError, Result};
pub use naming::{file_name_for, identifier_for, TEMP_DIR};
pub use reader::{CachedReader, FileReader, RemoteReader, TeeReader, TeeState};
pub use types::{CacheConfig, CacheEntry, CacheStats};
