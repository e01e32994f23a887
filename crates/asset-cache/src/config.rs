//! Cache configuration.
//!
//! Field names follow Rust conventions; the camelCase names used by older
//! deployments (`maxMemoryMB`, `defaultTTL`, ...) are accepted as aliases
//! when loading from YAML or JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Asset cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory tier capacity in megabytes.
    #[serde(default = "default_max_memory_mb", alias = "maxMemoryMB")]
    pub max_memory_mb: u64,

    /// Disk tier capacity in megabytes.
    #[serde(default = "default_max_disk_mb", alias = "maxDiskMB")]
    pub max_disk_mb: u64,

    /// Base time-to-live in milliseconds.
    #[serde(default = "default_ttl_ms", alias = "defaultTTL")]
    pub default_ttl_ms: u64,

    /// TTL multiplier reached at quality 100 (>= 1.0).
    #[serde(default = "default_quality_ttl_multiplier", alias = "qualityTTLMultiplier")]
    pub quality_ttl_multiplier: f64,

    /// Whether the disk tier is used at all.
    #[serde(default = "default_enable_disk_cache", alias = "enableDiskCache")]
    pub enable_disk_cache: bool,

    /// Directory holding `<fingerprint>.cache` files.
    #[serde(default = "default_cache_directory", alias = "cacheDirectory")]
    pub cache_directory: PathBuf,

    /// Largest payload accepted, in bytes.
    #[serde(default = "default_max_asset_size", alias = "maxAssetSize")]
    pub max_asset_size: u64,

    /// Quality score at or above which entries are persisted to disk.
    #[serde(default = "default_priority_threshold", alias = "priorityThreshold")]
    pub priority_threshold: f64,

    /// Compression level knob (0-9). Payloads are stored as given.
    #[serde(default = "default_compression_level", alias = "compressionLevel")]
    pub compression_level: u32,

    /// Interval between background cleanup passes; 0 disables the task.
    #[serde(default = "default_cleanup_interval_secs", alias = "cleanupInterval")]
    pub cleanup_interval_secs: u64,

    /// Extra bytes freed beyond the immediate need when eviction runs.
    #[serde(default = "default_eviction_margin_bytes", alias = "evictionMargin")]
    pub eviction_margin_bytes: u64,
}

fn default_max_memory_mb() -> u64 {
    500
}

fn default_max_disk_mb() -> u64 {
    2000
}

fn default_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_quality_ttl_multiplier() -> f64 {
    2.0
}

fn default_enable_disk_cache() -> bool {
    true
}

fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("asset-cache").join("entries"))
        .unwrap_or_else(|| PathBuf::from("/tmp/asset-cache/entries"))
}

fn default_max_asset_size() -> u64 {
    50 * BYTES_PER_MB
}

fn default_priority_threshold() -> f64 {
    70.0
}

fn default_compression_level() -> u32 {
    6
}

fn default_cleanup_interval_secs() -> u64 {
    30 * 60
}

fn default_eviction_margin_bytes() -> u64 {
    50 * BYTES_PER_MB
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            max_disk_mb: default_max_disk_mb(),
            default_ttl_ms: default_ttl_ms(),
            quality_ttl_multiplier: default_quality_ttl_multiplier(),
            enable_disk_cache: default_enable_disk_cache(),
            cache_directory: default_cache_directory(),
            max_asset_size: default_max_asset_size(),
            priority_threshold: default_priority_threshold(),
            compression_level: default_compression_level(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            eviction_margin_bytes: default_eviction_margin_bytes(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `ASSET_CACHE_MAX_MEMORY_MB` | `max_memory_mb` |
    /// | `ASSET_CACHE_MAX_DISK_MB` | `max_disk_mb` |
    /// | `ASSET_CACHE_DEFAULT_TTL_MS` | `default_ttl_ms` |
    /// | `ASSET_CACHE_QUALITY_TTL_MULTIPLIER` | `quality_ttl_multiplier` |
    /// | `ASSET_CACHE_ENABLE_DISK` | `enable_disk_cache` |
    /// | `ASSET_CACHE_DIR` | `cache_directory` |
    /// | `ASSET_CACHE_MAX_ASSET_SIZE` | `max_asset_size` |
    /// | `ASSET_CACHE_PRIORITY_THRESHOLD` | `priority_threshold` |
    /// | `ASSET_CACHE_COMPRESSION_LEVEL` | `compression_level` |
    /// | `ASSET_CACHE_CLEANUP_INTERVAL_SECS` | `cleanup_interval_secs` |
    /// | `ASSET_CACHE_EVICTION_MARGIN_BYTES` | `eviction_margin_bytes` |
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            max_memory_mb: parsed("ASSET_CACHE_MAX_MEMORY_MB").unwrap_or(defaults.max_memory_mb),
            max_disk_mb: parsed("ASSET_CACHE_MAX_DISK_MB").unwrap_or(defaults.max_disk_mb),
            default_ttl_ms: parsed("ASSET_CACHE_DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            quality_ttl_multiplier: parsed("ASSET_CACHE_QUALITY_TTL_MULTIPLIER")
                .unwrap_or(defaults.quality_ttl_multiplier),
            enable_disk_cache: std::env::var("ASSET_CACHE_ENABLE_DISK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.enable_disk_cache),
            cache_directory: std::env::var("ASSET_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_directory),
            max_asset_size: parsed("ASSET_CACHE_MAX_ASSET_SIZE").unwrap_or(defaults.max_asset_size),
            priority_threshold: parsed("ASSET_CACHE_PRIORITY_THRESHOLD")
                .unwrap_or(defaults.priority_threshold),
            compression_level: parsed("ASSET_CACHE_COMPRESSION_LEVEL")
                .unwrap_or(defaults.compression_level),
            cleanup_interval_secs: parsed("ASSET_CACHE_CLEANUP_INTERVAL_SECS")
                .unwrap_or(defaults.cleanup_interval_secs),
            eviction_margin_bytes: parsed("ASSET_CACHE_EVICTION_MARGIN_BYTES")
                .unwrap_or(defaults.eviction_margin_bytes),
        }
    }

    /// Parse config from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> CacheResult<Self> {
        serde_yaml::from_str(content).map_err(|e| CacheError::Config {
            message: format!("invalid cache config: {}", e),
        })
    }

    /// Load config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Check value ranges and cross-field constraints.
    pub fn validate(&self) -> CacheResult<()> {
        let fail = |message: String| Err(CacheError::Config { message });

        if self.max_memory_mb == 0 {
            return fail("max_memory_mb must be greater than 0".to_string());
        }
        if self.default_ttl_ms == 0 {
            return fail("default_ttl_ms must be greater than 0".to_string());
        }
        if !self.quality_ttl_multiplier.is_finite() || self.quality_ttl_multiplier < 1.0 {
            return fail(format!(
                "quality_ttl_multiplier must be >= 1.0, got {}",
                self.quality_ttl_multiplier
            ));
        }
        if !(0.0..=100.0).contains(&self.priority_threshold) {
            return fail(format!(
                "priority_threshold must be within 0-100, got {}",
                self.priority_threshold
            ));
        }
        if self.max_asset_size > self.max_memory_bytes() {
            return fail(format!(
                "max_asset_size ({} bytes) exceeds the memory tier ({} bytes)",
                self.max_asset_size,
                self.max_memory_bytes()
            ));
        }
        if self.compression_level > 9 {
            return fail(format!(
                "compression_level must be within 0-9, got {}",
                self.compression_level
            ));
        }
        Ok(())
    }

    /// Memory tier capacity in bytes.
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Disk tier capacity in bytes.
    pub fn max_disk_bytes(&self) -> u64 {
        self.max_disk_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Base TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Background cleanup interval, or `None` when disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    /// Set the cache directory.
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Set the memory tier capacity.
    pub fn with_max_memory_mb(mut self, mb: u64) -> Self {
        self.max_memory_mb = mb;
        self
    }

    /// Set the disk tier capacity.
    pub fn with_max_disk_mb(mut self, mb: u64) -> Self {
        self.max_disk_mb = mb;
        self
    }

    /// Set the base TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_ms = ttl.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Set the quality TTL multiplier.
    pub fn with_quality_ttl_multiplier(mut self, multiplier: f64) -> Self {
        self.quality_ttl_multiplier = multiplier;
        self
    }

    /// Enable or disable the disk tier.
    pub fn with_disk_cache(mut self, enabled: bool) -> Self {
        self.enable_disk_cache = enabled;
        self
    }

    /// Set the largest accepted payload.
    pub fn with_max_asset_size(mut self, bytes: u64) -> Self {
        self.max_asset_size = bytes;
        self
    }

    /// Set the disk promotion threshold.
    pub fn with_priority_threshold(mut self, threshold: f64) -> Self {
        self.priority_threshold = threshold;
        self
    }

    /// Set the cleanup interval (0 disables the background task).
    pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    /// Set the eviction safety margin.
    pub fn with_eviction_margin_bytes(mut self, bytes: u64) -> Self {
        self.eviction_margin_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_memory_bytes(), 500 * BYTES_PER_MB);
        assert_eq!(config.default_ttl(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.cleanup_interval(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_yaml_accepts_camel_case_aliases() {
        let yaml = "maxMemoryMB: 64\ndefaultTTL: 1000\nqualityTTLMultiplier: 3.0\nenableDiskCache: false\ncacheDirectory: /var/cache/assets\npriorityThreshold: 55";
        let config = CacheConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_memory_mb, 64);
        assert_eq!(config.default_ttl_ms, 1000);
        assert_eq!(config.quality_ttl_multiplier, 3.0);
        assert!(!config.enable_disk_cache);
        assert_eq!(config.cache_directory, PathBuf::from("/var/cache/assets"));
        assert_eq!(config.priority_threshold, 55.0);
        // untouched fields keep defaults
        assert_eq!(config.max_disk_mb, 2000);
    }

    #[test]
    fn test_yaml_rejects_garbage() {
        let err = CacheConfig::from_yaml_str("max_memory_mb: [1, 2]").unwrap_err();
        assert!(matches!(err, CacheError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let low_multiplier = CacheConfig::default().with_quality_ttl_multiplier(0.5);
        assert!(low_multiplier.validate().is_err());

        let bad_threshold = CacheConfig::default().with_priority_threshold(101.0);
        assert!(bad_threshold.validate().is_err());

        let zero_ttl = CacheConfig::default().with_default_ttl(Duration::ZERO);
        assert!(zero_ttl.validate().is_err());

        let oversized_assets = CacheConfig::default()
            .with_max_memory_mb(1)
            .with_max_asset_size(2 * BYTES_PER_MB);
        assert!(oversized_assets.validate().is_err());

        let mut loud = CacheConfig::default();
        loud.compression_level = 12;
        assert!(loud.validate().is_err());
    }

    #[test]
    fn test_zero_interval_disables_cleanup() {
        let config = CacheConfig::default().with_cleanup_interval_secs(0);
        assert_eq!(config.cleanup_interval(), None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("ASSET_CACHE_MAX_MEMORY_MB", "128");
        std::env::set_var("ASSET_CACHE_ENABLE_DISK", "false");
        std::env::set_var("ASSET_CACHE_DIR", "/srv/assets");
        std::env::set_var("ASSET_CACHE_PRIORITY_THRESHOLD", "not-a-number");

        let config = CacheConfig::from_env();

        std::env::remove_var("ASSET_CACHE_MAX_MEMORY_MB");
        std::env::remove_var("ASSET_CACHE_ENABLE_DISK");
        std::env::remove_var("ASSET_CACHE_DIR");
        std::env::remove_var("ASSET_CACHE_PRIORITY_THRESHOLD");

        assert_eq!(config.max_memory_mb, 128);
        assert!(!config.enable_disk_cache);
        assert_eq!(config.cache_directory, PathBuf::from("/srv/assets"));
        assert_eq!(config.priority_threshold, 70.0);
    }
}
