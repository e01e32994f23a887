use super::args::*;

pub mod clear;
pub mod dispatch;
pub mod entries;
pub mod fingerprint;
pub mod get;
pub mod put;
pub mod stats;
pub mod sweep;

pub use dispatch::dispatch;

use anyhow::Context;
use asset_cache::{AssetCache, CacheConfig, CacheKey};

/// Resolve the effective config: YAML file or environment, then `--dir`.
///
/// Background cleanup is disabled; each command is a single short pass.
pub(crate) fn load_config(global: &GlobalArgs) -> anyhow::Result<CacheConfig> {
    let mut config = match &global.config {
        Some(path) => CacheConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CacheConfig::from_env(),
    };
    if let Some(dir) = &global.dir {
        config = config.with_cache_directory(dir);
    }
    Ok(config.with_cleanup_interval_secs(0))
}

pub(crate) async fn open_cache(global: &GlobalArgs) -> anyhow::Result<AssetCache> {
    let config = load_config(global)?;
    AssetCache::open(config)
        .await
        .context("failed to open asset cache")
}

pub(crate) fn parse_key(raw: &str) -> anyhow::Result<CacheKey> {
    serde_json::from_str(raw).with_context(|| format!("invalid cache key JSON: {raw}"))
}
