//! Environment configuration

use crate::error::{MaintenanceError, Result};
use file_blob_cache::CacheConfig;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub cache_dir: PathBuf,
    /// Entries not accessed for this many days are removed
    pub max_age_days: Option<u32>,
    /// Evict least recently accessed entries down to this many bytes
    pub max_cache_size: Option<u64>,
}

impl MaintenanceConfig {
    /// Read `CACHE_DIR` (required), `MAX_AGE_DAYS` and `MAX_CACHE_SIZE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cache_dir = lookup("CACHE_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| MaintenanceError::Config("CACHE_DIR is not set".to_string()))?;

        Ok(Self {
            cache_dir,
            max_age_days: parse_optional(&lookup, "MAX_AGE_DAYS")?,
            max_cache_size: parse_optional(&lookup, "MAX_CACHE_SIZE")?,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(&self.cache_dir)
    }
}

fn parse_optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            MaintenanceError::Config(format!("{} must be a non-negative integer, got {:?}", name, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_cache_dir_required() {
        let result = MaintenanceConfig::from_lookup(lookup(&[("MAX_AGE_DAYS", "7")]));
        assert!(matches!(result, Err(MaintenanceError::Config(_))));

        let result = MaintenanceConfig::from_lookup(lookup(&[("CACHE_DIR", "")]));
        assert!(matches!(result, Err(MaintenanceError::Config(_))));
    }

    #[test]
    fn test_limits_are_optional() {
        let config = MaintenanceConfig::from_lookup(lookup(&[("CACHE_DIR", "/var/cache/blobs")]))
            .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/blobs"));
        assert_eq!(config.max_age_days, None);
        assert_eq!(config.max_cache_size, None);
    }

    #[test]
    fn test_limits_are_parsed() {
        let config = MaintenanceConfig::from_lookup(lookup(&[
            ("CACHE_DIR", "/cache"),
            ("MAX_AGE_DAYS", "14"),
            ("MAX_CACHE_SIZE", " 5000000000 "),
        ]))
        .unwrap();
        assert_eq!(config.max_age_days, Some(14));
        assert_eq!(config.max_cache_size, Some(5_000_000_000));
        assert_eq!(config.cache_config().root, PathBuf::from("/cache"));
    }

    #[test]
    fn test_negative_limit_is_rejected() {
        let result = MaintenanceConfig::from_lookup(lookup(&[
            ("CACHE_DIR", "/cache"),
            ("MAX_AGE_DAYS", "-1"),
        ]));
        assert!(matches!(result, Err(MaintenanceError::Config(msg)) if msg.contains("MAX_AGE_DAYS")));
    }
}
