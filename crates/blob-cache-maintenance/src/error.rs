//! Error types for the cache maintenance task

use std::fmt;

#[derive(Debug)]
pub enum MaintenanceError {
    Config(String),
    Cache(file_blob_cache::CacheError),
    /// Eviction ran but the cache is still larger than the limit
    OverBudget { max_total_bytes: u64 },
}

impl fmt::Display for MaintenanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MaintenanceError::Cache(err) => write!(f, "Cache error: {}", err),
            MaintenanceError::OverBudget { max_total_bytes } => {
                write!(f, "Cache still exceeds {} bytes after eviction", max_total_bytes)
            }
        }
    }
}

impl std::error::Error for MaintenanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaintenanceError::Cache(err) => Some(err),
            _ => None,
        }
    }
}

impl From<file_blob_cache::CacheError> for MaintenanceError {
    fn from(err: file_blob_cache::CacheError) -> Self {
        MaintenanceError::Cache(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for MaintenanceError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        MaintenanceError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MaintenanceError>;
