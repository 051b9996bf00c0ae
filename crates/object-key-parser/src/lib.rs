//! Parser for table object keys
//!
//! Decomposes keys of the form
//! `<prefix>/<timestampMillis>_<tableName>[v<version>][_<subTable>].<suffix>`
//! into their component parts.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Parsed components of an object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub prefix: String,
    pub timestamp_millis: u64,
    /// Table name with the version marker removed
    pub table_name: String,
    /// Schema version; 0 when the key carries none
    pub version: u32,
    pub suffix: String,
}

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)/([0-9]+)_([^.]*)\.(.*)$").unwrap());

/// `<base>v<N>_<sub>`
static SUBTABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^_]+)v([0-9]+)(_.+)$").unwrap());

/// `<table>v<N>`
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)v([0-9]+)$").unwrap());

impl ObjectKey {
    /// Parse a key like "a/b/1618105577372_HistoricalClientCountsv4.csv"
    pub fn parse(key: &str) -> Option<Self> {
        let caps = KEY_RE.captures(key)?;
        let timestamp_millis = caps[2].parse().ok()?;
        let (table_name, version) = split_version(&caps[3])?;
        Some(Self {
            prefix: caps[1].to_string(),
            timestamp_millis,
            table_name,
            version,
            suffix: caps[4].to_string(),
        })
    }

    /// The key's timestamp as a UTC instant
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.timestamp_millis).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

fn split_version(table: &str) -> Option<(String, u32)> {
    if let Some(caps) = SUBTABLE_RE.captures(table) {
        let version = caps[2].parse().ok()?;
        return Some((format!("{}{}", &caps[1], &caps[3]), version));
    }
    if let Some(caps) = TABLE_RE.captures(table) {
        let version = caps[2].parse().ok()?;
        return Some((caps[1].to_string(), version));
    }
    Some((table.to_string(), 0))
}

/// Parse an object key; `None` when it does not follow the naming convention
pub fn parse_key(key: &str) -> Option<ObjectKey> {
    ObjectKey::parse(key)
}
