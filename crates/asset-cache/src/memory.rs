//! In-memory tier.
//!
//! A plain map keyed by fingerprint with exact byte accounting. The store
//! has no policy of its own: the facade decides what to evict and when to
//! touch access statistics.

use std::collections::HashMap;

use crate::fingerprint::Fingerprint;
use crate::types::CachedEntry;

/// Fingerprint-keyed map of memory-resident entries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<Fingerprint, CachedEntry>,
    usage_bytes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry without touching it.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&CachedEntry> {
        self.entries.get(fingerprint)
    }

    pub(crate) fn get_mut(&mut self, fingerprint: &Fingerprint) -> Option<&mut CachedEntry> {
        self.entries.get_mut(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Insert or replace an entry, returning the replaced one.
    pub fn put(&mut self, entry: CachedEntry) -> Option<CachedEntry> {
        let added = entry.size_bytes();
        let previous = self.entries.insert(entry.fingerprint.clone(), entry);
        if let Some(old) = &previous {
            self.usage_bytes = self.usage_bytes.saturating_sub(old.size_bytes());
        }
        self.usage_bytes += added;
        previous
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<CachedEntry> {
        let removed = self.entries.remove(fingerprint)?;
        self.usage_bytes = self.usage_bytes.saturating_sub(removed.size_bytes());
        Some(removed)
    }

    /// Iterate over all entries.
    pub fn all(&self) -> impl Iterator<Item = &CachedEntry> {
        self.entries.values()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of `size_bytes` over current contents.
    pub fn usage_bytes(&self) -> u64 {
        self.usage_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.usage_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, EntryMetadata, PayloadKind};
    use chrono::Utc;

    fn entry(name: &str, size: usize) -> CachedEntry {
        let now = Utc::now();
        CachedEntry {
            id: format!("0-{name}"),
            fingerprint: Fingerprint::from_hex(name),
            payload: Asset::new(vec![0u8; size], PayloadKind::Binary),
            metadata: EntryMetadata {
                prompt: name.to_string(),
                style: String::new(),
                asset_type: "sprite".to_string(),
                parameters: serde_json::Map::new(),
                quality_score: 50.0,
                generation_time_ms: 0,
                model_id: String::new(),
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
                size_bytes: size as u64,
            },
            priority: 40.0,
            expires_at: None,
        }
    }

    fn recomputed(store: &MemoryStore) -> u64 {
        store.all().map(|e| e.size_bytes()).sum()
    }

    #[test]
    fn test_put_get_remove() {
        let mut store = MemoryStore::new();
        assert!(store.put(entry("a", 10)).is_none());
        assert!(store.put(entry("b", 20)).is_none());

        assert_eq!(store.len(), 2);
        assert_eq!(store.usage_bytes(), 30);
        assert_eq!(store.get(&Fingerprint::from_hex("a")).unwrap().size_bytes(), 10);

        let removed = store.remove(&Fingerprint::from_hex("a")).unwrap();
        assert_eq!(removed.size_bytes(), 10);
        assert_eq!(store.usage_bytes(), 20);
        assert!(store.remove(&Fingerprint::from_hex("a")).is_none());
        assert_eq!(store.usage_bytes(), 20);
    }

    #[test]
    fn test_overwrite_does_not_drift() {
        let mut store = MemoryStore::new();
        store.put(entry("a", 10));
        let previous = store.put(entry("a", 35));

        assert_eq!(previous.unwrap().size_bytes(), 10);
        assert_eq!(store.len(), 1);
        assert_eq!(store.usage_bytes(), 35);
        assert_eq!(store.usage_bytes(), recomputed(&store));
    }

    #[test]
    fn test_usage_matches_contents_after_mixed_ops() {
        let mut store = MemoryStore::new();
        for i in 0..20 {
            store.put(entry(&format!("e{}", i % 7), 10 + i));
            if i % 3 == 0 {
                store.remove(&Fingerprint::from_hex(format!("e{}", i % 5)));
            }
            assert_eq!(store.usage_bytes(), recomputed(&store));
        }

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.usage_bytes(), 0);
    }
}
