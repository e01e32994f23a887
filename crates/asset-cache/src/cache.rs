//! The two-tier cache facade.
//!
//! Lookups go memory → disk → miss. Stores compute priority and expiration,
//! make room in memory (evicting and spilling high-quality entries to disk),
//! insert, and write through to disk when the quality clears the promotion
//! threshold.
//!
//! Memory state sits behind a `RwLock` that is never held across disk I/O.
//! Inserts, promotions, expiry removals, eviction, cleanup and clear
//! additionally serialize on a writer gate, so at most one of them reshapes
//! either tier at a time. Every removal re-checks state under the lock and
//! tolerates "already gone".

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::disk::{DiskEntrySummary, DiskStore};
use crate::error::CacheResult;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::memory::MemoryStore;
use crate::policy::{self, EvictionCandidate};
use crate::scheduler::CleanupScheduler;
use crate::stats::{self, AccessTracker, CacheCounters, TOP_ASSET_TYPES};
use crate::types::{
    AccessPatterns, Asset, CacheKey, CacheStats, CachedEntry, CleanupReport, EntryMetadata,
    StoreOutcome, WarmupEntry,
};

#[derive(Debug, Default)]
struct MemoryState {
    store: MemoryStore,
    tracker: AccessTracker,
}

/// State shared between the facade and the cleanup task.
#[derive(Debug)]
pub(crate) struct CacheShared {
    config: CacheConfig,
    state: RwLock<MemoryState>,
    disk: Option<DiskStore>,
    counters: CacheCounters,
    write_gate: Mutex<()>,
}

impl CacheShared {
    fn new(config: CacheConfig, disk: Option<DiskStore>) -> Self {
        Self {
            config,
            state: RwLock::new(MemoryState::default()),
            disk,
            counters: CacheCounters::default(),
            write_gate: Mutex::new(()),
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Asset> {
        let fp = fingerprint(key);
        let now = Utc::now();

        let expired_in_memory = {
            let mut state = self.state.write().await;
            let MemoryState { store, tracker } = &mut *state;
            match store.get_mut(&fp) {
                Some(entry) if !entry.is_expired(now) => {
                    entry.record_access(now);
                    tracker.record(&fp, now);
                    self.counters.record_hit();
                    debug!(fingerprint = %fp, access_count = entry.metadata.access_count, "memory hit");
                    return Some(entry.payload.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired_in_memory {
            return self.expire_resident(&fp, now).await;
        }

        if !self.is_on_disk(&fp).await {
            self.counters.record_miss();
            debug!(fingerprint = %fp, "cache miss");
            return None;
        }

        self.promote(&fp, now).await
    }

    /// Drop an expired memory entry and its disk copy, then count a miss.
    ///
    /// Runs under the writer gate so a concurrent store cannot commit a fresh
    /// copy between the memory check and the disk removal.
    async fn expire_resident(&self, fp: &Fingerprint, now: DateTime<Utc>) -> Option<Asset> {
        let _gate = self.write_gate.lock().await;

        let removed = {
            let mut state = self.state.write().await;
            let MemoryState { store, tracker } = &mut *state;
            match store.get_mut(fp) {
                // replaced by a store while we waited
                Some(entry) if !entry.is_expired(now) => {
                    entry.record_access(now);
                    tracker.record(fp, now);
                    self.counters.record_hit();
                    return Some(entry.payload.clone());
                }
                Some(_) => {
                    store.remove(fp);
                    tracker.remove(fp);
                    true
                }
                None => false,
            }
        };

        if removed {
            if let Some(disk) = &self.disk {
                disk.remove(fp).await;
            }
            self.counters.record_expired();
            debug!(fingerprint = %fp, "entry expired");
        }
        self.counters.record_miss();
        None
    }

    /// Serve a disk-indexed entry by moving it into memory.
    ///
    /// The record is read under the writer gate: a clear or invalidate that
    /// ran since the index check makes this a miss instead of bringing the
    /// entry back.
    async fn promote(&self, fp: &Fingerprint, now: DateTime<Utc>) -> Option<Asset> {
        let _gate = self.write_gate.lock().await;

        // a concurrent lookup may have promoted it while we waited
        {
            let mut state = self.state.write().await;
            let MemoryState { store, tracker } = &mut *state;
            if let Some(resident) = store.get_mut(fp) {
                if !resident.is_expired(now) {
                    resident.record_access(now);
                    tracker.record(fp, now);
                    self.counters.record_hit();
                    return Some(resident.payload.clone());
                }
            }
        }

        let Some(disk) = &self.disk else {
            self.counters.record_miss();
            return None;
        };
        let Some(mut entry) = disk.read(fp).await else {
            self.counters.record_miss();
            debug!(fingerprint = %fp, "cache miss");
            return None;
        };

        if entry.is_expired(now) {
            disk.remove(fp).await;
            self.counters.record_expired();
            self.counters.record_miss();
            debug!(fingerprint = %fp, "disk entry expired");
            return None;
        }

        // written under a larger limit; it stays on disk for that config
        if entry.size_bytes() > self.config.max_asset_size {
            self.counters.record_miss();
            debug!(
                fingerprint = %fp,
                size_bytes = entry.size_bytes(),
                max_asset_size = self.config.max_asset_size,
                "disk entry exceeds size limit, not promoted"
            );
            return None;
        }

        self.counters.record_disk_read();
        self.ensure_headroom(entry.size_bytes()).await;

        entry.record_access(now);
        let asset = entry.payload.clone();
        {
            let mut state = self.state.write().await;
            state.tracker.record(fp, now);
            state.store.put(entry);
        }
        self.counters.record_hit();
        debug!(fingerprint = %fp, "disk hit promoted to memory");
        Some(asset)
    }

    async fn store(
        &self,
        key: &CacheKey,
        asset: Asset,
        quality_score: f64,
        generation_time_ms: u64,
    ) -> StoreOutcome {
        let size_bytes = asset.size_bytes();
        if size_bytes > self.config.max_asset_size {
            self.counters.record_rejected();
            warn!(
                size_bytes,
                max_asset_size = self.config.max_asset_size,
                asset_type = %key.asset_type,
                "asset exceeds size limit, not cached"
            );
            return StoreOutcome::Rejected {
                reason: format!(
                    "asset is {} bytes, limit is {}",
                    size_bytes, self.config.max_asset_size
                ),
            };
        }

        let fp = fingerprint(key);
        let now = Utc::now();
        let quality = policy::clamp_score(quality_score);

        let entry = CachedEntry {
            id: new_entry_id(now),
            fingerprint: fp.clone(),
            payload: asset,
            metadata: EntryMetadata {
                prompt: key.prompt.clone(),
                style: key.style.clone(),
                asset_type: key.asset_type.clone(),
                parameters: key.parameters.clone(),
                quality_score: quality,
                generation_time_ms,
                model_id: key.model_id.clone(),
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
                size_bytes,
            },
            priority: policy::initial_priority(quality, generation_time_ms),
            expires_at: Some(policy::compute_expires_at(
                now,
                quality,
                self.config.default_ttl(),
                self.config.quality_ttl_multiplier,
            )),
        };

        let _gate = self.write_gate.lock().await;

        // an overwrite frees the old copy's bytes
        let replaced = self
            .state
            .read()
            .await
            .store
            .get(&fp)
            .map(|e| e.size_bytes())
            .unwrap_or(0);
        self.ensure_headroom(size_bytes.saturating_sub(replaced)).await;

        {
            let mut state = self.state.write().await;
            state.tracker.remove(&fp);
            state.store.put(entry.clone());
        }

        if quality >= self.config.priority_threshold {
            self.persist(&entry).await;
        } else if let Some(disk) = &self.disk {
            // drop a stale standby left by an earlier, better-rated copy
            if disk.remove(&fp).await {
                debug!(fingerprint = %fp, "removed stale disk copy");
            }
        }

        debug!(
            fingerprint = %fp,
            size_bytes,
            quality,
            priority = entry.priority,
            "cached asset"
        );
        StoreOutcome::Cached(fp)
    }

    /// Evict until `incoming` more bytes fit under the memory cap.
    ///
    /// Caller holds the writer gate.
    async fn ensure_headroom(&self, incoming: u64) {
        let cap = self.config.max_memory_bytes();

        let (bytes_to_free, candidates) = {
            let state = self.state.read().await;
            let usage = state.store.usage_bytes();
            if usage.saturating_add(incoming) <= cap {
                return;
            }
            let needed = usage + incoming - cap + self.config.eviction_margin_bytes;
            let candidates: Vec<EvictionCandidate> = state
                .store
                .all()
                .map(|e| EvictionCandidate {
                    fingerprint: e.fingerprint.clone(),
                    priority: e.priority,
                    last_accessed_at: e.metadata.last_accessed_at,
                    size_bytes: e.size_bytes(),
                })
                .collect();
            (needed, candidates)
        };

        let victims = policy::select_victims(candidates, bytes_to_free);
        debug!(
            bytes_to_free,
            victims = victims.len(),
            "memory full, evicting"
        );

        for victim in victims {
            let fp = victim.fingerprint;
            let Some(entry) = self.state.read().await.store.get(&fp).cloned() else {
                continue;
            };

            // entries written through at store time are already on disk
            if entry.quality_score() >= self.config.priority_threshold
                && !self.is_on_disk(&fp).await
            {
                self.persist(&entry).await;
            }

            let removed = {
                let mut state = self.state.write().await;
                let removed = state.store.remove(&fp).is_some();
                state.tracker.remove(&fp);
                removed
            };
            if removed {
                self.counters.record_eviction();
                debug!(fingerprint = %fp, priority = entry.priority, "evicted from memory");
            }
        }
    }

    async fn is_on_disk(&self, fp: &Fingerprint) -> bool {
        match &self.disk {
            Some(disk) => disk.contains(fp).await,
            None => false,
        }
    }

    /// Best-effort write-through. Returns whether the entry reached disk.
    async fn persist(&self, entry: &CachedEntry) -> bool {
        let Some(disk) = &self.disk else {
            return false;
        };

        match disk
            .write_through_within(entry, self.config.max_disk_bytes())
            .await
        {
            Ok(Some(_)) => {
                self.counters.record_disk_write();
                true
            }
            Ok(None) => false,
            Err(e) if e.is_disk_error() => {
                warn!(fingerprint = %entry.fingerprint, error = %e, "disk write failed");
                false
            }
            Err(e) => {
                error!(fingerprint = %entry.fingerprint, error = %e, "could not encode entry");
                false
            }
        }
    }

    /// Remove a fingerprint from memory, its access log and disk.
    async fn remove_everywhere(&self, fp: &Fingerprint) -> bool {
        let in_memory = {
            let mut state = self.state.write().await;
            state.tracker.remove(fp);
            state.store.remove(fp).is_some()
        };
        let on_disk = match &self.disk {
            Some(disk) => disk.remove(fp).await,
            None => false,
        };
        in_memory || on_disk
    }

    pub(crate) async fn cleanup_pass(&self) -> CleanupReport {
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();

        let expired: Vec<Fingerprint> = self
            .state
            .read()
            .await
            .store
            .all()
            .filter(|e| e.is_expired(now))
            .map(|e| e.fingerprint.clone())
            .collect();

        let mut expired_removed = 0;
        for fp in expired {
            // a lookup may have dropped it already
            let removed = {
                let mut state = self.state.write().await;
                let still_expired = state.store.get(&fp).is_some_and(|e| e.is_expired(now));
                if still_expired {
                    state.store.remove(&fp);
                    state.tracker.remove(&fp);
                }
                still_expired
            };
            if removed {
                if let Some(disk) = &self.disk {
                    disk.remove(&fp).await;
                }
                self.counters.record_expired();
                expired_removed += 1;
            }
        }

        let access_logs_pruned = self.state.write().await.tracker.prune_all(now);

        let disk_usage_bytes = match &self.disk {
            Some(disk) => disk.disk_usage_bytes().await,
            None => 0,
        };
        self.counters.set_disk_usage(disk_usage_bytes);

        if expired_removed > 0 || access_logs_pruned > 0 {
            info!(
                expired_removed,
                access_logs_pruned, disk_usage_bytes, "cleanup pass removed stale data"
            );
        }

        CleanupReport {
            expired_removed,
            access_logs_pruned,
            disk_usage_bytes,
        }
    }

    async fn clear(&self) {
        let _gate = self.write_gate.lock().await;
        {
            let mut state = self.state.write().await;
            state.store.clear();
            state.tracker.clear();
        }
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.clear().await {
                warn!(error = %e, "failed to clear disk tier");
            }
        }
        self.counters.reset();
        info!("asset cache cleared");
    }

    async fn stats(&self) -> CacheStats {
        let counters = self.counters.snapshot();

        let (memory_usage_bytes, memory_entries, average_quality, top_asset_types, mut seen) = {
            let state = self.state.read().await;
            (
                state.store.usage_bytes(),
                state.store.len(),
                stats::average_quality(&state.store),
                stats::top_asset_types(&state.store, TOP_ASSET_TYPES),
                state.store.fingerprints().cloned().collect::<HashSet<_>>(),
            )
        };

        let (disk_usage_bytes, disk_entries) = match &self.disk {
            Some(disk) => {
                let usage = disk.disk_usage_bytes().await;
                let on_disk = disk.fingerprints().await;
                let count = on_disk.len();
                seen.extend(on_disk);
                (usage, count)
            }
            None => (0, 0),
        };
        self.counters.set_disk_usage(disk_usage_bytes);

        CacheStats {
            memory_usage_bytes,
            disk_usage_bytes,
            memory_entries,
            disk_entries,
            total_cached_assets: seen.len(),
            hit_rate: counters.hit_rate(),
            miss_rate: counters.miss_rate(),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expired_removals: counters.expired,
            rejected: counters.rejected,
            disk_reads: counters.disk_reads,
            disk_writes: counters.disk_writes,
            average_quality,
            top_asset_types,
        }
    }

    async fn access_patterns(&self, top_n: usize) -> AccessPatterns {
        let now = Utc::now();
        let state = self.state.read().await;
        AccessPatterns {
            most_accessed: stats::most_accessed(&state.store, top_n),
            hot: state.tracker.hot(now, top_n),
            efficiency: self.counters.snapshot().hit_rate(),
        }
    }
}

/// Creation millis plus a random suffix.
fn new_entry_id(now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        now.timestamp_millis(),
        hex::encode(rand::random::<[u8; 4]>())
    )
}

/// Two-tier asset cache.
///
/// Construct with [`AssetCache::open`]; call [`AssetCache::shutdown`] before
/// dropping to run a final cleanup pass. Dropping without shutdown only
/// cancels the background task.
#[derive(Debug)]
pub struct AssetCache {
    shared: Arc<CacheShared>,
    scheduler: Mutex<Option<CleanupScheduler>>,
}

impl AssetCache {
    /// Validate `config`, index the disk tier and start background cleanup.
    ///
    /// Must be called inside a Tokio runtime. Disk problems are logged and
    /// leave the cache usable; only invalid configuration is an error.
    pub async fn open(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let disk = if config.enable_disk_cache {
            let disk = DiskStore::new(&config.cache_directory);
            if let Err(e) = disk.ensure_dir().await {
                warn!(error = %e, "disk tier unavailable, lookups will miss on disk");
            }
            if let Err(e) = disk.rebuild_index().await {
                warn!(error = %e, "failed to rebuild disk index");
            }
            Some(disk)
        } else {
            None
        };

        let shared = Arc::new(CacheShared::new(config, disk));
        let scheduler = shared
            .config
            .cleanup_interval()
            .map(|interval| CleanupScheduler::spawn(Arc::clone(&shared), interval));

        info!(
            max_memory_mb = shared.config.max_memory_mb,
            disk_enabled = shared.disk.is_some(),
            dir = %shared.config.cache_directory.display(),
            "asset cache opened"
        );

        Ok(Self {
            shared,
            scheduler: Mutex::new(scheduler),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Fingerprint a key the way the cache does.
    pub fn fingerprint(&self, key: &CacheKey) -> Fingerprint {
        fingerprint(key)
    }

    /// Look up an asset. Misses (including disk trouble) return `None`.
    pub async fn get_cached_asset(&self, key: &CacheKey) -> Option<Asset> {
        self.shared.lookup(key).await
    }

    /// Store a freshly generated asset.
    ///
    /// Oversized assets are rejected; eviction and disk failures are
    /// absorbed.
    pub async fn cache_asset(
        &self,
        key: &CacheKey,
        asset: Asset,
        quality_score: f64,
        generation_time_ms: u64,
    ) -> StoreOutcome {
        self.shared
            .store(key, asset, quality_score, generation_time_ms)
            .await
    }

    /// Insert many assets in order. Returns how many were cached.
    pub async fn warmup_cache(&self, entries: Vec<WarmupEntry>) -> usize {
        let total = entries.len();
        let mut cached = 0;
        for entry in entries {
            if self
                .shared
                .store(&entry.key, entry.asset, entry.quality, 0)
                .await
                .is_cached()
            {
                cached += 1;
            }
        }
        info!(cached, total, "cache warmup finished");
        cached
    }

    /// Drop a key from both tiers. Returns whether anything was removed.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let fp = fingerprint(key);
        let _gate = self.shared.write_gate.lock().await;
        let removed = self.shared.remove_everywhere(&fp).await;
        if removed {
            debug!(fingerprint = %fp, "invalidated");
        }
        removed
    }

    /// Empty memory, delete disk entries and reset every counter.
    pub async fn clear_cache(&self) {
        self.shared.clear().await;
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.shared.stats().await
    }

    /// Most-accessed and hot entries plus current efficiency. Read-only.
    pub async fn analyze_access_patterns(&self, top_n: usize) -> AccessPatterns {
        self.shared.access_patterns(top_n).await
    }

    /// Run one cleanup pass now.
    pub async fn run_cleanup(&self) -> CleanupReport {
        self.shared.cleanup_pass().await
    }

    /// Remove expired or unreadable records from the disk tier.
    pub async fn sweep_disk(&self) -> usize {
        match &self.shared.disk {
            Some(disk) => {
                let _gate = self.shared.write_gate.lock().await;
                disk.sweep_expired(Utc::now()).await
            }
            None => 0,
        }
    }

    /// Summaries of every record on disk.
    pub async fn disk_entries(&self) -> Vec<DiskEntrySummary> {
        match &self.shared.disk {
            Some(disk) => disk.list().await,
            None => Vec::new(),
        }
    }

    /// Whether the key currently has a memory-resident entry (no side effects).
    pub async fn is_memory_resident(&self, key: &CacheKey) -> bool {
        self.shared.state.read().await.store.contains(&fingerprint(key))
    }

    /// Whether the key currently has an indexed disk record (no side effects).
    pub async fn is_on_disk(&self, key: &CacheKey) -> bool {
        self.shared.is_on_disk(&fingerprint(key)).await
    }

    /// Stop background cleanup (waiting for an in-flight pass) and run a
    /// final pass.
    pub async fn shutdown(&self) -> CleanupReport {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop().await;
        }
        let report = self.shared.cleanup_pass().await;
        info!("asset cache shut down");
        report
    }
}

impl Drop for AssetCache {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.get_mut().take() {
            scheduler.cancel();
        }
    }
}
