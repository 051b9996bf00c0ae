//! Range queries and the listing plan derived from them

use crate::error::{RangeListError, Result};
use regex::Regex;

/// Outcome of checking one listed key against a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatch {
    Accepted,
    /// Well-formed key outside the range, or filename rejected by the pattern
    Rejected,
    /// Key does not follow the `<segments>/<range>/.../<digits>_<name>.<ext>` form
    Malformed,
}

/// A request for objects whose range segment lies within `[range_min, range_max]`
#[derive(Debug, Clone)]
pub struct RangeQuery {
    range_min: String,
    range_max: String,
    bucket: String,
    listing_prefix: String,
    key_pattern: Regex,
    file_pattern: Regex,
}

impl RangeQuery {
    /// Build a query.
    ///
    /// * `prefix` - `bucket/initial/prefix`, with or without trailing `/`
    /// * `range_min`, `range_max` - subpaths without trailing `/`, or empty
    /// * `range_index` - index of the first range component within the key
    /// * `file_pattern` - regex searched for in the final file name
    pub fn new(
        prefix: &str,
        range_min: &str,
        range_max: &str,
        range_index: usize,
        file_pattern: &str,
    ) -> Result<Self> {
        let (bucket, path) = prefix.split_once('/').unwrap_or((prefix, ""));
        if bucket.is_empty() {
            return Err(RangeListError::InvalidPrefix(format!(
                "no bucket in prefix {:?}",
                prefix
            )));
        }

        Ok(Self {
            range_min: range_min.to_string(),
            range_max: range_max.to_string(),
            bucket: bucket.to_string(),
            listing_prefix: listing_prefix(path, range_min, range_max, range_index),
            key_pattern: Regex::new(&key_pattern(range_index, component_count(range_max)))?,
            file_pattern: Regex::new(file_pattern)?,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Prefix sent to the store, narrowed by the range's common subpath
    pub fn listing_prefix(&self) -> &str {
        &self.listing_prefix
    }

    pub fn range_min(&self) -> &str {
        &self.range_min
    }

    pub fn range_max(&self) -> &str {
        &self.range_max
    }

    /// Split a key into its range segment and file name
    pub fn split_key<'k>(&self, key: &'k str) -> Option<(&'k str, &'k str)> {
        let caps = self.key_pattern.captures(key)?;
        let range = caps.get(1).map_or("", |m| m.as_str());
        let file_name = caps.get(2)?.as_str();
        Some((range, file_name))
    }

    pub fn check(&self, key: &str) -> KeyMatch {
        let Some((range, file_name)) = self.split_key(key) else {
            return KeyMatch::Malformed;
        };
        let in_range = self.range_min.as_str() <= range && range <= self.range_max.as_str();
        if in_range && self.file_pattern.is_match(file_name) {
            KeyMatch::Accepted
        } else {
            KeyMatch::Rejected
        }
    }
}

fn component_count(subpath: &str) -> usize {
    if subpath.is_empty() {
        0
    } else {
        subpath.matches('/').count() + 1
    }
}

/// Leading path components shared by both bounds
fn common_components<'r>(range_min: &'r str, range_max: &str) -> Vec<&'r str> {
    range_min
        .split('/')
        .zip(range_max.split('/'))
        .take_while(|(lo, hi)| lo == hi)
        .map(|(lo, _)| lo)
        .collect()
}

fn listing_prefix(path: &str, range_min: &str, range_max: &str, range_index: usize) -> String {
    let mut components: Vec<&str> = path.split('/').collect();
    let trailing_separator = components.last() == Some(&"");
    if range_index != components.len() - usize::from(trailing_separator) {
        return path.to_string();
    }

    // The range immediately follows the prefix
    if trailing_separator {
        components.pop();
    }
    let common = common_components(range_min, range_max);
    if common.is_empty() {
        components.push("");
    } else {
        components.extend(common);
    }
    components.join("/")
}

fn key_pattern(range_index: usize, range_components: usize) -> String {
    let range_group = match range_components {
        0 => "()".to_string(),
        n => format!("([^/]+{})/", "/[^/]+".repeat(n - 1)),
    };
    format!(
        r"^(?:[^/]+/){{{}}}{}(?:[^/]+/)*([0-9]+_[A-Za-z0-9_]+\..*)",
        range_index, range_group
    )
}
