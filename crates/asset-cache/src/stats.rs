//! Access tracking and statistics.
//!
//! Access logs feed analytics only (hot-entry detection); nothing in the
//! lookup or eviction path depends on them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::fingerprint::Fingerprint;
use crate::memory::MemoryStore;
use crate::types::{AccessedEntry, AssetTypeCount, HotEntry};

/// Rolling window kept per access log, in seconds.
pub const ACCESS_WINDOW_SECS: i64 = 60 * 60;

/// Asset types reported in stats.
pub const TOP_ASSET_TYPES: usize = 5;

/// Per-fingerprint access timestamps within the last hour.
#[derive(Debug, Default)]
pub struct AccessTracker {
    logs: HashMap<Fingerprint, VecDeque<DateTime<Utc>>>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an access and prune that log to the window.
    pub fn record(&mut self, fingerprint: &Fingerprint, now: DateTime<Utc>) {
        let log = self.logs.entry(fingerprint.clone()).or_default();
        log.push_back(now);
        prune_log(log, now);
    }

    /// Accesses of one fingerprint within the window ending at `now`.
    pub fn recent_count(&self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(ACCESS_WINDOW_SECS);
        self.logs
            .get(fingerprint)
            .map(|log| log.iter().filter(|t| **t >= cutoff).count())
            .unwrap_or(0)
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) {
        self.logs.remove(fingerprint);
    }

    /// Prune every log and drop the empty ones. Returns logs dropped.
    pub fn prune_all(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.logs.len();
        self.logs.retain(|_, log| {
            prune_log(log, now);
            !log.is_empty()
        });
        before - self.logs.len()
    }

    /// Entries with at least one access in the window, busiest first.
    pub fn hot(&self, now: DateTime<Utc>, limit: usize) -> Vec<HotEntry> {
        let mut hot: Vec<HotEntry> = self
            .logs
            .keys()
            .map(|fp| HotEntry {
                fingerprint: fp.clone(),
                recent_accesses: self.recent_count(fp, now),
            })
            .filter(|h| h.recent_accesses > 0)
            .collect();
        hot.sort_by(|a, b| {
            b.recent_accesses
                .cmp(&a.recent_accesses)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        hot.truncate(limit);
        hot
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }
}

fn prune_log(log: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - Duration::seconds(ACCESS_WINDOW_SECS);
    while log.front().is_some_and(|t| *t < cutoff) {
        log.pop_front();
    }
}

/// Cumulative counters, shared between request handling and cleanup.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    last_disk_usage: AtomicU64,
}

/// Plain copy of [`CacheCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub rejected: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
    pub last_disk_usage: u64,
}

impl CounterSnapshot {
    /// Hit percentage over all lookups (0 when there were none).
    pub fn hit_rate(&self) -> f64 {
        percent(self.hits, self.hits + self.misses)
    }

    pub fn miss_rate(&self) -> f64 {
        percent(self.misses, self.hits + self.misses)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

impl CacheCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_disk_usage(&self, bytes: u64) {
        self.last_disk_usage.store(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            last_disk_usage: self.last_disk_usage.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.expired,
            &self.rejected,
            &self.disk_reads,
            &self.disk_writes,
            &self.last_disk_usage,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Mean quality of memory-resident entries (0 when empty).
pub fn average_quality(memory: &MemoryStore) -> f64 {
    if memory.is_empty() {
        return 0.0;
    }
    let sum: f64 = memory.all().map(|e| e.quality_score()).sum();
    sum / memory.len() as f64
}

/// Most common asset types in memory, ties broken by name.
pub fn top_asset_types(memory: &MemoryStore, limit: usize) -> Vec<AssetTypeCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in memory.all() {
        *counts.entry(entry.metadata.asset_type.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<AssetTypeCount> = counts
        .into_iter()
        .map(|(asset_type, count)| AssetTypeCount {
            asset_type: asset_type.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.asset_type.cmp(&b.asset_type)));
    ranked.truncate(limit);
    ranked
}

/// Entries with the highest lifetime access counts.
pub fn most_accessed(memory: &MemoryStore, limit: usize) -> Vec<AccessedEntry> {
    let mut entries: Vec<AccessedEntry> = memory
        .all()
        .map(|e| AccessedEntry {
            fingerprint: e.fingerprint.clone(),
            prompt: e.metadata.prompt.clone(),
            asset_type: e.metadata.asset_type.clone(),
            access_count: e.metadata.access_count,
            priority: e.priority,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.access_count
            .cmp(&a.access_count)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    entries.truncate(limit);
    entries
}
