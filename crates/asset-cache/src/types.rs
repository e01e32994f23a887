//! Core data types: keys, assets, cached entries and reporting structs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::policy;

/// Logical identity of a generation request.
///
/// Never persisted as-is; it is normalized and hashed into a [`Fingerprint`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    /// Generation prompt.
    pub prompt: String,

    /// Art or sound style.
    #[serde(default)]
    pub style: String,

    /// Asset type (e.g. "sprite", "background", "sfx").
    pub asset_type: String,

    /// Free-form generation parameters.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,

    /// Model that produced (or will produce) the asset.
    #[serde(default)]
    pub model_id: String,
}

impl CacheKey {
    /// Create a key with empty style, model and parameters.
    pub fn new(prompt: impl Into<String>, asset_type: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            asset_type: asset_type.into(),
            ..Self::default()
        }
    }

    /// Set the style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Set the model id.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Add a generation parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Kind of binary payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Image,
    Sound,
    #[default]
    Binary,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Sound => write!(f, "sound"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl std::str::FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "sound" | "audio" => Ok(Self::Sound),
            "binary" => Ok(Self::Binary),
            other => Err(format!("unknown payload kind: {}", other)),
        }
    }
}

/// Producer-supplied payload description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadInfo {
    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,

    /// Encoding, e.g. "png" or "wav".
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// An opaque generated artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Raw bytes; the cache never looks inside.
    pub data: Bytes,

    pub kind: PayloadKind,

    pub info: PayloadInfo,
}

impl Asset {
    /// Create an asset with no payload info.
    pub fn new(data: impl Into<Bytes>, kind: PayloadKind) -> Self {
        Self {
            data: data.into(),
            kind,
            info: PayloadInfo::default(),
        }
    }

    /// Attach payload info.
    pub fn with_info(mut self, info: PayloadInfo) -> Self {
        self.info = info;
        self
    }

    /// Payload size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Metadata stored with every entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub prompt: String,
    pub style: String,
    pub asset_type: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,

    /// Producer-assessed quality, 0-100.
    pub quality_score: f64,

    pub generation_time_ms: u64,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,

    /// Starts at 1 on creation.
    pub access_count: u64,

    pub size_bytes: u64,
}

/// The stored unit, identified by its fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    /// Creation millis plus a random suffix; not used for lookup.
    pub id: String,
    pub fingerprint: Fingerprint,
    pub payload: Asset,
    pub metadata: EntryMetadata,

    /// Derived score, 0-100; only ever boosted by access.
    pub priority: f64,

    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedEntry {
    /// Apply one read access: count, recency, priority boost.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.metadata.access_count += 1;
        self.metadata.last_accessed_at = now;
        self.priority = policy::boosted_priority(self.priority, self.metadata.access_count);
    }

    /// Whether the entry is past its expiration at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        policy::is_expired(self.expires_at, now)
    }

    pub fn size_bytes(&self) -> u64 {
        self.metadata.size_bytes
    }

    pub fn quality_score(&self) -> f64 {
        self.metadata.quality_score
    }
}

/// Result of [`AssetCache::cache_asset`](crate::AssetCache::cache_asset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Stored in memory (and possibly on disk).
    Cached(Fingerprint),

    /// Not cached; the reason has been logged.
    Rejected { reason: String },
}

impl StoreOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// One item for [`AssetCache::warmup_cache`](crate::AssetCache::warmup_cache).
#[derive(Debug, Clone)]
pub struct WarmupEntry {
    pub key: CacheKey,
    pub asset: Asset,
    pub quality: f64,
}

/// Read-only snapshot of cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_usage_bytes: u64,
    pub disk_usage_bytes: u64,
    pub memory_entries: usize,
    pub disk_entries: usize,

    /// Distinct fingerprints across both tiers.
    pub total_cached_assets: usize,

    /// Percentage of lookups that hit either tier.
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
    pub rejected: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,

    /// Mean quality score of memory-resident entries.
    pub average_quality: f64,

    /// Most frequent asset types in memory, most common first.
    pub top_asset_types: Vec<AssetTypeCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTypeCount {
    pub asset_type: String,
    pub count: usize,
}

/// Entry ranked by lifetime access count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessedEntry {
    pub fingerprint: Fingerprint,
    pub prompt: String,
    pub asset_type: String,
    pub access_count: u64,
    pub priority: f64,
}

/// Entry ranked by accesses within the last hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotEntry {
    pub fingerprint: Fingerprint,
    pub recent_accesses: usize,
}

/// Output of [`AssetCache::analyze_access_patterns`](crate::AssetCache::analyze_access_patterns).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPatterns {
    pub most_accessed: Vec<AccessedEntry>,
    pub hot: Vec<HotEntry>,

    /// Same as the hit rate, in percent.
    pub efficiency: f64,
}

/// Summary of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired_removed: usize,
    pub access_logs_pruned: usize,
    pub disk_usage_bytes: u64,
}
