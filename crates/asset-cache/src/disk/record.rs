//! On-disk record format.
//!
//! One JSON document per entry: metadata, priority, expiration and the
//! payload as standard base64. The `format` field lets a future layout be
//! told apart from this one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::fingerprint::Fingerprint;
use crate::types::{Asset, CachedEntry, EntryMetadata, PayloadInfo, PayloadKind};

/// Current record layout.
pub(crate) const RECORD_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DiskRecord {
    pub format: u32,
    pub id: String,
    pub fingerprint: Fingerprint,
    pub kind: PayloadKind,
    #[serde(default)]
    pub info: PayloadInfo,
    pub metadata: EntryMetadata,
    pub priority: f64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Base64 payload.
    pub payload: String,
}

impl DiskRecord {
    pub(crate) fn from_entry(entry: &CachedEntry) -> Self {
        Self {
            format: RECORD_FORMAT,
            id: entry.id.clone(),
            fingerprint: entry.fingerprint.clone(),
            kind: entry.payload.kind,
            info: entry.payload.info.clone(),
            metadata: entry.metadata.clone(),
            priority: entry.priority,
            expires_at: entry.expires_at,
            payload: BASE64.encode(&entry.payload.data),
        }
    }

    pub(crate) fn into_entry(self) -> CacheResult<CachedEntry> {
        let corrupt = |message: String| CacheError::Corrupt {
            fingerprint: self.fingerprint.to_string(),
            message,
        };

        if self.format != RECORD_FORMAT {
            return Err(corrupt(format!("unsupported record format {}", self.format)));
        }

        let data = BASE64
            .decode(self.payload.as_bytes())
            .map_err(|e| corrupt(format!("invalid base64 payload: {}", e)))?;

        if data.len() as u64 != self.metadata.size_bytes {
            return Err(corrupt(format!(
                "payload is {} bytes, metadata says {}",
                data.len(),
                self.metadata.size_bytes
            )));
        }

        Ok(CachedEntry {
            id: self.id,
            fingerprint: self.fingerprint,
            payload: Asset {
                data: data.into(),
                kind: self.kind,
                info: self.info,
            },
            metadata: self.metadata,
            priority: self.priority,
            expires_at: self.expires_at,
        })
    }
}

pub(crate) fn encode(entry: &CachedEntry) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(&DiskRecord::from_entry(entry)).map_err(|e| CacheError::Serialize {
        message: format!("failed to serialize entry {}: {}", entry.fingerprint, e),
    })
}

/// Decode a record, checking it belongs to `expected`.
pub(crate) fn decode(expected: &Fingerprint, bytes: &[u8]) -> CacheResult<CachedEntry> {
    let record: DiskRecord = serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt {
        fingerprint: expected.to_string(),
        message: format!("failed to parse record: {}", e),
    })?;

    if &record.fingerprint != expected {
        return Err(CacheError::Corrupt {
            fingerprint: expected.to_string(),
            message: format!("record belongs to {}", record.fingerprint),
        });
    }

    record.into_entry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_entry() -> CachedEntry {
        let now = Utc::now();
        let data = vec![0u8, 159, 146, 150, 255, 10];
        CachedEntry {
            id: "1700000000000-1a2b3c4d".to_string(),
            fingerprint: Fingerprint::from_hex("cd".repeat(32)),
            payload: Asset::new(data.clone(), PayloadKind::Sound).with_info(PayloadInfo {
                format: Some("wav".to_string()),
                duration_ms: Some(1200),
                ..PayloadInfo::default()
            }),
            metadata: EntryMetadata {
                prompt: "explosion".to_string(),
                style: "retro".to_string(),
                asset_type: "sfx".to_string(),
                parameters: serde_json::Map::new(),
                quality_score: 88.0,
                generation_time_ms: 3200,
                model_id: "audio-1".to_string(),
                created_at: now,
                last_accessed_at: now,
                access_count: 3,
                size_bytes: data.len() as u64,
            },
            priority: 73.5,
            expires_at: Some(now + Duration::hours(2)),
        }
    }

    #[test]
    fn test_record_preserves_binary_payload_and_metadata() {
        let entry = sample_entry();
        let bytes = encode(&entry).unwrap();
        let decoded = decode(&entry.fingerprint, &bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let fp = Fingerprint::from_hex("cd".repeat(32));
        let err = decode(&fp, b"{not json").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_decode_rejects_foreign_fingerprint() {
        let entry = sample_entry();
        let bytes = encode(&entry).unwrap();
        let other = Fingerprint::from_hex("ef".repeat(32));
        let err = decode(&other, &bytes).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let entry = sample_entry();
        let mut record = DiskRecord::from_entry(&entry);
        record.payload = BASE64.encode([1u8, 2]);
        let bytes = serde_json::to_vec(&record).unwrap();

        let err = decode(&entry.fingerprint, &bytes).unwrap_err();
        assert!(err.to_string().contains("metadata says"));
    }

    #[test]
    fn test_decode_rejects_unknown_format() {
        let entry = sample_entry();
        let mut record = DiskRecord::from_entry(&entry);
        record.format = 99;
        let bytes = serde_json::to_vec(&record).unwrap();
        assert!(decode(&entry.fingerprint, &bytes).is_err());
    }
}
