//! Error types for the blob cache

use blob_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// The remote store has no such object
    NotFound { identifier: String },
    /// Transport failure while fetching or streaming the remote object
    RemoteIo(StoreError),
    Io(Box<std::io::Error>),
    InvalidIdentifier(String),
    /// An eviction victim could not be deleted
    EvictionBlocked { identifier: String, reason: String },
    DoubleClose { identifier: String },
    ReaderClosed { identifier: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NotFound { identifier } => write!(f, "Object not found: {}", identifier),
            CacheError::RemoteIo(err) => write!(f, "Remote IO error: {}", err),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::InvalidIdentifier(id) => {
                write!(f, "Invalid identifier {:?}: expected bucket/key", id)
            }
            CacheError::EvictionBlocked { identifier, reason } => {
                write!(f, "Could not evict {}: {}", identifier, reason)
            }
            CacheError::DoubleClose { identifier } => {
                write!(f, "Reader for {} closed twice", identifier)
            }
            CacheError::ReaderClosed { identifier } => {
                write!(f, "Reader for {} is closed", identifier)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::RemoteIo(err) => Some(err),
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { bucket, key } => CacheError::NotFound {
                identifier: format!("{}/{}", bucket, key),
            },
            other => CacheError::RemoteIo(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err = CacheError::from(StoreError::not_found("bucket", "a/b.csv"));
        assert!(matches!(err, CacheError::NotFound { ref identifier } if identifier == "bucket/a/b.csv"));
    }

    #[test]
    fn test_transient_maps_to_remote_io() {
        let err = CacheError::from(StoreError::Transient("reset".to_string()));
        assert!(matches!(err, CacheError::RemoteIo(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_double_close_display() {
        let err = CacheError::DoubleClose {
            identifier: "bucket/key".to_string(),
        };
        assert_eq!(format!("{}", err), "Reader for bucket/key closed twice");
    }

    #[test]
    fn test_eviction_blocked_display() {
        let err = CacheError::EvictionBlocked {
            identifier: "bucket/key".to_string(),
            reason: "open by a reader".to_string(),
        };
        assert_eq!(format!("{}", err), "Could not evict bucket/key: open by a reader");
    }

    #[test]
    fn test_error_is_debug() {
        let err = CacheError::InvalidIdentifier("nobucket".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("InvalidIdentifier"));
    }
}
