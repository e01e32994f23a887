//! Two-tier cache for generated image and sound assets.
//!
//! Generating an asset is slow and expensive, so results are cached under a
//! fingerprint of the request that produced them:
//!
//! - Memory tier with a byte cap and priority-based eviction
//! - Disk tier (one JSON file per entry) for high-quality assets
//! - Quality-weighted expiration: better assets live longer
//! - Hit/miss statistics and access-pattern analytics
//! - Background cleanup of expired entries
//!
//! # Quick Start
//!
//! ```no_run
//! use asset_cache::{Asset, AssetCache, CacheConfig, CacheKey, PayloadKind};
//!
//! # async fn example() -> asset_cache::CacheResult<()> {
//! let cache = AssetCache::open(CacheConfig::from_env()).await?;
//!
//! let key = CacheKey::new("a red dragon", "sprite").with_style("pixel-art");
//! if cache.get_cached_asset(&key).await.is_none() {
//!     let png = vec![0u8; 1024]; // generated elsewhere
//!     cache
//!         .cache_asset(&key, Asset::new(png, PayloadKind::Image), 85.0, 4_200)
//!         .await;
//! }
//!
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `ASSET_CACHE_MAX_MEMORY_MB` | Memory tier cap (default: 500) |
//! | `ASSET_CACHE_MAX_DISK_MB` | Disk tier budget (default: 2000) |
//! | `ASSET_CACHE_DEFAULT_TTL_MS` | Base time-to-live (default: 24h) |
//! | `ASSET_CACHE_QUALITY_TTL_MULTIPLIER` | TTL multiplier at quality 100 (default: 2.0) |
//! | `ASSET_CACHE_ENABLE_DISK` | Enable the disk tier (default: true) |
//! | `ASSET_CACHE_DIR` | Disk tier directory |
//! | `ASSET_CACHE_MAX_ASSET_SIZE` | Largest cacheable payload in bytes (default: 50 MB) |
//! | `ASSET_CACHE_PRIORITY_THRESHOLD` | Minimum quality for disk persistence (default: 70) |
//! | `ASSET_CACHE_CLEANUP_INTERVAL_SECS` | Cleanup period, 0 disables (default: 1800) |
//! | `ASSET_CACHE_EVICTION_MARGIN_BYTES` | Extra bytes freed per eviction (default: 50 MB) |

mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod fingerprint;
pub mod memory;
pub mod policy;
mod scheduler;
pub mod stats;
pub mod types;

pub use cache::AssetCache;
pub use config::CacheConfig;
pub use disk::{DiskEntrySummary, DiskStore};
pub use error::{CacheError, CacheResult};
pub use fingerprint::{fingerprint, Fingerprint};
pub use types::{
    AccessPatterns, AccessedEntry, Asset, AssetTypeCount, CacheKey, CacheStats, CachedEntry,
    CleanupReport, EntryMetadata, HotEntry, PayloadInfo, PayloadKind, StoreOutcome, WarmupEntry,
};
