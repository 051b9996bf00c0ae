//! Error types for range listing

use blob_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum RangeListError {
    Store(StoreError),
    InvalidPrefix(String),
    InvalidPattern(Box<regex::Error>),
}

impl fmt::Display for RangeListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeListError::Store(err) => write!(f, "Listing failed: {}", err),
            RangeListError::InvalidPrefix(msg) => write!(f, "Invalid prefix: {}", msg),
            RangeListError::InvalidPattern(err) => write!(f, "Invalid file pattern: {}", err),
        }
    }
}

impl std::error::Error for RangeListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RangeListError::Store(err) => Some(err),
            RangeListError::InvalidPattern(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<StoreError> for RangeListError {
    fn from(err: StoreError) -> Self {
        RangeListError::Store(err)
    }
}

impl From<regex::Error> for RangeListError {
    fn from(err: regex::Error) -> Self {
        RangeListError::InvalidPattern(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RangeListError>;
