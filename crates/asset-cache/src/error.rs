//! Error types for the asset cache.
//!
//! These errors travel between the internal layers (disk store, config
//! loading). The [`AssetCache`](crate::AssetCache) facade logs and absorbs
//! them; only [`AssetCache::open`](crate::AssetCache::open) surfaces one.

/// Asset cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Filesystem operation failed.
    #[error("io error: {message}")]
    Io { message: String },

    /// An on-disk record could not be decoded.
    #[error("corrupt cache entry {fingerprint}: {message}")]
    Corrupt {
        fingerprint: String,
        message: String,
    },

    /// Record could not be encoded.
    #[error("serialize error: {message}")]
    Serialize { message: String },
}

impl CacheError {
    /// Whether the error came from the disk tier (and should degrade to a miss).
    pub fn is_disk_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Corrupt { .. })
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
