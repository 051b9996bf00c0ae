//! Remote object store capability
//!
//! Defines the interface a blob cache and a range lister consume: paginated
//! listing, forward-only object streams, and the descriptors they produce.
//! Ships an in-memory store, a local-directory store, and a retrying wrapper.

pub mod error;
pub mod local;
pub mod memory;
pub mod retry;
pub mod source;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use local::LocalDirStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use source::{ByteSource, ReaderSource, RemoteSource};
pub use store::{list_objects, ObjectStore};
pub use types::{ObjectPage, Owner, RemoteObject};
