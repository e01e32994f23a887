//! Persistent disk tier.
//!
//! # Layout
//!
//! ```text
//! {cache_directory}/
//!   {fingerprint}.cache   # JSON record (metadata + base64 payload)
//!   {fingerprint}.tmp     # in-flight write, ignored by scans
//! ```
//!
//! The store keeps an in-memory index of fingerprint → file, rebuilt by a
//! directory scan at startup. Every operation is best-effort: failures are
//! logged and surface as misses, never as errors to cache callers.

mod io;
mod record;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::fingerprint::Fingerprint;
use crate::types::{CachedEntry, PayloadKind};

#[derive(Debug, Clone)]
struct DiskSlot {
    path: PathBuf,
    size_bytes: u64,
}

/// Summary of one on-disk entry, for inspection tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskEntrySummary {
    pub fingerprint: Fingerprint,
    pub prompt: String,
    pub asset_type: String,
    pub kind: PayloadKind,
    pub quality_score: f64,
    pub priority: f64,
    pub size_bytes: u64,
    pub file_bytes: u64,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One file per fingerprint plus a path index.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    index: RwLock<HashMap<Fingerprint, DiskSlot>>,
}

impl DiskStore {
    /// Create a store over `dir`. Nothing is touched until used.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed.
    pub async fn ensure_dir(&self) -> CacheResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::Io {
                message: format!("failed to create {}: {}", self.dir.display(), e),
            })
    }

    /// Serialize `entry` to `<fingerprint>.cache` and index it.
    ///
    /// The index is only updated after the file is committed, so a failed
    /// write leaves the previous state untouched. Returns the file size.
    pub async fn write_through(&self, entry: &CachedEntry) -> CacheResult<u64> {
        let bytes = record::encode(entry)?;
        self.commit(entry, bytes).await
    }

    /// Like [`write_through`](Self::write_through), but only if the tier
    /// stays within `max_bytes` afterwards.
    ///
    /// The check uses the encoded record size and discounts an existing file
    /// for the same fingerprint, which the write replaces. Returns `None`
    /// when the write was skipped.
    pub async fn write_through_within(
        &self,
        entry: &CachedEntry,
        max_bytes: u64,
    ) -> CacheResult<Option<u64>> {
        let bytes = record::encode(entry)?;

        let projected = {
            let index = self.index.read().await;
            let indexed: u64 = index.values().map(|s| s.size_bytes).sum();
            let replaced = index
                .get(&entry.fingerprint)
                .map(|s| s.size_bytes)
                .unwrap_or(0);
            (indexed - replaced).saturating_add(bytes.len() as u64)
        };
        if projected > max_bytes {
            debug!(
                fingerprint = %entry.fingerprint,
                projected,
                max_bytes,
                "disk budget exhausted, skipping write"
            );
            return Ok(None);
        }

        self.commit(entry, bytes).await.map(Some)
    }

    async fn commit(&self, entry: &CachedEntry, bytes: Vec<u8>) -> CacheResult<u64> {
        let path = io::entry_path(&self.dir, &entry.fingerprint);

        self.ensure_dir().await?;
        io::write_atomic(&path, &bytes).await?;

        let size_bytes = bytes.len() as u64;
        self.index
            .write()
            .await
            .insert(entry.fingerprint.clone(), DiskSlot { path, size_bytes });

        debug!(fingerprint = %entry.fingerprint, size_bytes, "wrote entry to disk");
        Ok(size_bytes)
    }

    /// Load an indexed entry.
    ///
    /// Unreadable or unparseable files are dropped from the index (and
    /// deleted when corrupt) so the next lookup is a clean miss.
    pub async fn read(&self, fingerprint: &Fingerprint) -> Option<CachedEntry> {
        let path = self.index.read().await.get(fingerprint)?.path.clone();

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint,
                    path = %path.display(),
                    error = %e,
                    "disk entry unreadable, dropping from index"
                );
                self.index.write().await.remove(fingerprint);
                return None;
            }
        };

        match record::decode(fingerprint, &bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "corrupt disk entry removed");
                self.index.write().await.remove(fingerprint);
                if let Err(e) = io::remove_if_exists(&path).await {
                    debug!(error = %e, "could not delete corrupt entry file");
                }
                None
            }
        }
    }

    /// Delete an entry's file and index slot. Returns whether it was indexed.
    pub async fn remove(&self, fingerprint: &Fingerprint) -> bool {
        let slot = self.index.write().await.remove(fingerprint);
        let path = slot
            .as_ref()
            .map(|s| s.path.clone())
            .unwrap_or_else(|| io::entry_path(&self.dir, fingerprint));

        if let Err(e) = io::remove_if_exists(&path).await {
            warn!(fingerprint = %fingerprint, error = %e, "failed to delete disk entry");
        }
        slot.is_some()
    }

    /// Rescan the directory and replace the index. Payloads are not loaded.
    pub async fn rebuild_index(&self) -> CacheResult<usize> {
        let mut rebuilt = HashMap::new();

        if fs::metadata(&self.dir).await.is_ok() {
            let mut entries = fs::read_dir(&self.dir).await.map_err(|e| CacheError::Io {
                message: format!("failed to read {}: {}", self.dir.display(), e),
            })?;

            while let Some(dir_entry) = entries.next_entry().await.map_err(|e| CacheError::Io {
                message: format!("failed to read directory entry: {}", e),
            })? {
                let path = dir_entry.path();
                let Some(fingerprint) = io::fingerprint_from_path(&path) else {
                    continue;
                };
                let Ok(meta) = dir_entry.metadata().await else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                rebuilt.insert(
                    fingerprint,
                    DiskSlot {
                        path,
                        size_bytes: meta.len(),
                    },
                );
            }
        }

        let count = rebuilt.len();
        *self.index.write().await = rebuilt;
        info!(dir = %self.dir.display(), entries = count, "disk index rebuilt");
        Ok(count)
    }

    /// Sum of real file sizes; vanished files are pruned from the index.
    pub async fn disk_usage_bytes(&self) -> u64 {
        let slots: Vec<(Fingerprint, PathBuf)> = self
            .index
            .read()
            .await
            .iter()
            .map(|(fp, slot)| (fp.clone(), slot.path.clone()))
            .collect();

        let mut total = 0u64;
        let mut vanished = Vec::new();
        for (fingerprint, path) in slots {
            match fs::metadata(&path).await {
                Ok(meta) => total += meta.len(),
                Err(_) => vanished.push(fingerprint),
            }
        }

        if !vanished.is_empty() {
            let mut index = self.index.write().await;
            for fingerprint in &vanished {
                index.remove(fingerprint);
            }
            debug!(pruned = vanished.len(), "pruned vanished disk entries from index");
        }
        total
    }

    /// Bytes of indexed files as last recorded (no I/O).
    pub async fn indexed_bytes(&self) -> u64 {
        self.index.read().await.values().map(|s| s.size_bytes).sum()
    }

    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.read().await.contains_key(fingerprint)
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn fingerprints(&self) -> Vec<Fingerprint> {
        self.index.read().await.keys().cloned().collect()
    }

    /// Delete every entry (and stray temp) file and empty the index.
    pub async fn clear(&self) -> CacheResult<usize> {
        self.index.write().await.clear();

        if fs::metadata(&self.dir).await.is_err() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| CacheError::Io {
            message: format!("failed to read {}: {}", self.dir.display(), e),
        })?;
        while let Some(dir_entry) = entries.next_entry().await.map_err(|e| CacheError::Io {
            message: format!("failed to read directory entry: {}", e),
        })? {
            let path = dir_entry.path();
            let is_temp = path.extension().is_some_and(|ext| ext == io::TEMP_EXTENSION);
            if io::fingerprint_from_path(&path).is_none() && !is_temp {
                continue;
            }
            if io::remove_if_exists(&path).await? {
                removed += 1;
            }
        }

        info!(dir = %self.dir.display(), removed, "disk tier cleared");
        Ok(removed)
    }

    /// Decode every indexed entry into a summary, healing corrupt ones.
    pub async fn list(&self) -> Vec<DiskEntrySummary> {
        let mut summaries = Vec::new();
        for fingerprint in self.fingerprints().await {
            let file_bytes = self
                .index
                .read()
                .await
                .get(&fingerprint)
                .map(|s| s.size_bytes)
                .unwrap_or_default();
            if let Some(entry) = self.read(&fingerprint).await {
                summaries.push(DiskEntrySummary {
                    fingerprint,
                    prompt: entry.metadata.prompt,
                    asset_type: entry.metadata.asset_type,
                    kind: entry.payload.kind,
                    quality_score: entry.metadata.quality_score,
                    priority: entry.priority,
                    size_bytes: entry.metadata.size_bytes,
                    file_bytes,
                    access_count: entry.metadata.access_count,
                    created_at: entry.metadata.created_at,
                    expires_at: entry.expires_at,
                });
            }
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Remove records that are expired at `now` (corrupt ones heal on read).
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for fingerprint in self.fingerprints().await {
            match self.read(&fingerprint).await {
                Some(entry) if entry.is_expired(now) => {
                    if self.remove(&fingerprint).await {
                        removed += 1;
                    }
                }
                Some(_) => {}
                None => removed += 1,
            }
        }
        if removed > 0 {
            info!(removed, "swept expired disk entries");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, EntryMetadata};
    use chrono::Duration;
    use tempfile::TempDir;

    fn entry(tag: &str, data: &[u8], expires_in: Option<Duration>) -> CachedEntry {
        let now = Utc::now();
        CachedEntry {
            id: format!("0-{tag}"),
            fingerprint: Fingerprint::from_hex(tag.repeat(32)),
            payload: Asset::new(data.to_vec(), PayloadKind::Image),
            metadata: EntryMetadata {
                prompt: format!("prompt {tag}"),
                style: String::new(),
                asset_type: "sprite".to_string(),
                parameters: serde_json::Map::new(),
                quality_score: 90.0,
                generation_time_ms: 1000,
                model_id: String::new(),
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
                size_bytes: data.len() as u64,
            },
            priority: 73.0,
            expires_at: expires_in.map(|d| now + d),
        }
    }

    fn create_store() -> (DiskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskStore::new(temp_dir.path().join("entries"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, _temp_dir) = create_store();
        let e = entry("ab", b"\x89PNG\r\n\x1a\n", None);

        let written = store.write_through(&e).await.unwrap();
        assert!(written > 0);
        assert!(store.contains(&e.fingerprint).await);
        assert!(io::entry_path(store.dir(), &e.fingerprint).exists());

        let read = store.read(&e.fingerprint).await.unwrap();
        assert_eq!(read.payload.data, e.payload.data);
        assert_eq!(read.metadata, e.metadata);
    }

    #[tokio::test]
    async fn test_budget_counts_encoded_size_and_replacement() {
        let (store, _temp_dir) = create_store();
        let a = entry("ab", &[7u8; 3000], None);
        let b = entry("cd", &[7u8; 3000], None);

        let size = store
            .write_through_within(&a, u64::MAX)
            .await
            .unwrap()
            .unwrap();
        // base64 plus metadata is larger than the payload
        assert!(size > 4000);

        // rewriting the same fingerprint replaces its file
        assert_eq!(store.write_through_within(&a, size).await.unwrap(), Some(size));

        // a second record of about the same size does not fit
        assert_eq!(store.write_through_within(&b, size + size / 2).await.unwrap(), None);
        assert!(!store.contains(&b.fingerprint).await);
        assert!(!io::entry_path(store.dir(), &b.fingerprint).exists());
        assert_eq!(store.indexed_bytes().await, size);
    }

    #[tokio::test]
    async fn test_read_unindexed_is_miss() {
        let (store, _temp_dir) = create_store();
        assert!(store.read(&Fingerprint::from_hex("00".repeat(32))).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_self_heals() {
        let (store, _temp_dir) = create_store();
        let e = entry("ab", b"data", None);
        store.write_through(&e).await.unwrap();

        let path = io::entry_path(store.dir(), &e.fingerprint);
        fs::write(&path, "this is not a record").await.unwrap();

        assert!(store.read(&e.fingerprint).await.is_none());
        assert!(!store.contains(&e.fingerprint).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_vanished_file_self_heals_on_read() {
        let (store, _temp_dir) = create_store();
        let e = entry("ab", b"data", None);
        store.write_through(&e).await.unwrap();
        fs::remove_file(io::entry_path(store.dir(), &e.fingerprint))
            .await
            .unwrap();

        assert!(store.read(&e.fingerprint).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_index_untouched() {
        let temp_dir = TempDir::new().unwrap();
        // a regular file where the directory should be
        let blocker = temp_dir.path().join("entries");
        fs::write(&blocker, b"not a dir").await.unwrap();
        let store = DiskStore::new(&blocker);

        let e = entry("ab", b"data", None);
        assert!(store.write_through(&e).await.is_err());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing() {
        let (store, _temp_dir) = create_store();
        let e = entry("ab", b"data", None);
        store.write_through(&e).await.unwrap();

        assert!(store.remove(&e.fingerprint).await);
        assert!(!store.remove(&e.fingerprint).await);
        assert!(store.read(&e.fingerprint).await.is_none());
    }

    #[tokio::test]
    async fn test_rebuild_index_finds_entries_only() {
        let (store, _temp_dir) = create_store();
        let a = entry("ab", b"aaaa", None);
        let b = entry("cd", b"bbbbbbbb", None);
        store.write_through(&a).await.unwrap();
        store.write_through(&b).await.unwrap();
        fs::write(store.dir().join("stray.tmp"), b"partial").await.unwrap();
        fs::write(store.dir().join("README.txt"), b"hi").await.unwrap();

        let reopened = DiskStore::new(store.dir());
        assert_eq!(reopened.rebuild_index().await.unwrap(), 2);
        assert!(reopened.contains(&a.fingerprint).await);
        assert_eq!(reopened.read(&b.fingerprint).await.unwrap().payload.data, b.payload.data);
    }

    #[tokio::test]
    async fn test_rebuild_index_missing_dir_is_empty() {
        let (store, _temp_dir) = create_store();
        assert_eq!(store.rebuild_index().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disk_usage_prunes_vanished() {
        let (store, _temp_dir) = create_store();
        let a = entry("ab", b"aaaa", None);
        let b = entry("cd", b"bbbb", None);
        let a_size = store.write_through(&a).await.unwrap();
        store.write_through(&b).await.unwrap();

        fs::remove_file(io::entry_path(store.dir(), &b.fingerprint))
            .await
            .unwrap();

        assert_eq!(store.disk_usage_bytes().await, a_size);
        assert!(!store.contains(&b.fingerprint).await);
        assert_eq!(store.indexed_bytes().await, a_size);
    }

    #[tokio::test]
    async fn test_clear_removes_entry_files() {
        let (store, _temp_dir) = create_store();
        store.write_through(&entry("ab", b"a", None)).await.unwrap();
        store.write_through(&entry("cd", b"b", None)).await.unwrap();
        fs::write(store.dir().join("keep.txt"), b"unrelated").await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.len().await, 0);
        assert!(store.dir().join("keep.txt").exists());
        assert_eq!(store.rebuild_index().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_and_list() {
        let (store, _temp_dir) = create_store();
        let live = entry("ab", b"live", Some(Duration::hours(1)));
        let dead = entry("cd", b"dead", Some(Duration::milliseconds(-1)));
        store.write_through(&live).await.unwrap();
        store.write_through(&dead).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.file_bytes > s.size_bytes));

        assert_eq!(store.sweep_expired(Utc::now()).await, 1);
        assert!(store.contains(&live.fingerprint).await);
        assert!(!store.contains(&dead.fingerprint).await);
    }
}
