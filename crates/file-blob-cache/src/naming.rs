//! Mapping between identifiers and cache file names

use crate::error::{CacheError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Scratch subdirectory for in-progress downloads
pub const TEMP_DIR: &str = "temp";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// File name for an identifier. Percent-encoding keeps it a single path
/// component and makes the mapping reversible.
pub fn file_name_for(identifier: &str) -> String {
    urlencoding::encode(identifier).into_owned()
}

/// Inverse of [`file_name_for`]; `None` for names the cache didn't write
pub fn identifier_for(file_name: &str) -> Option<String> {
    let identifier = urlencoding::decode(file_name).ok()?.into_owned();
    if file_name_for(&identifier) != file_name || split_identifier(&identifier).is_err() {
        return None;
    }
    Some(identifier)
}

/// Unique scratch file name for one download of `identifier`
pub(crate) fn temp_file_name(identifier: &str) -> String {
    format!(
        "{}.{}.{}.part",
        file_name_for(identifier),
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Split `bucket/key` at the first separator
pub(crate) fn split_identifier(identifier: &str) -> Result<(&str, &str)> {
    match identifier.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(CacheError::InvalidIdentifier(identifier.to_string())),
    }
}
