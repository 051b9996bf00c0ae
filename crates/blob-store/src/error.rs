//! Error types for remote object stores

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    NotFound { bucket: String, key: String },
    /// Network-level failure the caller may retry
    Transient(String),
    Io(Box<std::io::Error>),
}

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Whether retrying the same operation can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { bucket, key } => {
                write!(f, "Object not found: {}/{}", bucket, key)
            }
            StoreError::Transient(msg) => write!(f, "Transient store error: {}", msg),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
