//! Blob cache maintenance
//!
//! Expires stale entries and enforces a size limit on a cache directory.
//! Meant to run from a scheduler while no cache process is using the
//! directory, since leftover scratch files are deleted unconditionally.

mod config;
mod error;

use crate::config::MaintenanceConfig;
use crate::error::{MaintenanceError, Result};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("blob_cache_maintenance=info".parse()?)
        .add_directive("file_blob_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    let config = MaintenanceConfig::from_env()?;
    info!(
        cache_dir = ?config.cache_dir,
        max_age_days = ?config.max_age_days,
        max_cache_size = ?config.max_cache_size,
        "Starting cache maintenance"
    );

    run(&config).await
}

async fn run(config: &MaintenanceConfig) -> Result<()> {
    let satisfied = file_blob_cache::expire_dir(
        &config.cache_config(),
        config.max_age_days,
        config.max_cache_size,
    )
    .await?;

    match config.max_cache_size {
        Some(max_total_bytes) if !satisfied => {
            warn!(max_total_bytes, "Cache is still over its size limit");
            Err(MaintenanceError::OverBudget { max_total_bytes })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use file_blob_cache::file_name_for;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_trims_directory() {
        let dir = tempdir().unwrap();
        for id in ["bucket/a", "bucket/b", "bucket/c"] {
            std::fs::write(dir.path().join(file_name_for(id)), [0u8; 100]).unwrap();
        }
        let config = MaintenanceConfig {
            cache_dir: dir.path().to_path_buf(),
            max_age_days: Some(30),
            max_cache_size: Some(150),
        };

        run(&config).await.unwrap();
        let remaining = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .count();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_run_without_limits_keeps_everything() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(file_name_for("bucket/a")), b"data").unwrap();
        let config = MaintenanceConfig {
            cache_dir: dir.path().to_path_buf(),
            max_age_days: None,
            max_cache_size: None,
        };

        run(&config).await.unwrap();
        assert!(dir.path().join(file_name_for("bucket/a")).exists());
        assert!(dir.path().join(file_blob_cache::TEMP_DIR).is_dir());
    }
}
