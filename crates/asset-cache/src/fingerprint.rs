//! Deterministic fingerprints for cache keys.
//!
//! A key is normalized (numbers rounded to 3 decimals, strings trimmed and
//! lower-cased, recursively), serialized with JCS (RFC 8785, sorted keys, no
//! whitespace) and hashed with SHA-256. The hex digest names the entry in
//! both tiers, so it must stay stable across processes and releases.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use sha2::{Digest, Sha256};

use crate::types::CacheKey;

/// Decimal places kept when normalizing numbers.
const NUMBER_PRECISION: i32 = 3;

/// Largest integer emitted exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Hex-encoded SHA-256 of a normalized cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing hex digest (e.g. a file stem found on disk).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like a SHA-256 hex digest.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the fingerprint of a cache key.
pub fn fingerprint(key: &CacheKey) -> Fingerprint {
    let normalized = normalize_key(key);
    let bytes = canonical_bytes(&normalized);
    let hash = Sha256::digest(&bytes);
    Fingerprint(hex::encode(hash))
}

/// Normalized JSON form of a key; the input to hashing.
pub fn normalize_key(key: &CacheKey) -> JsonValue {
    let mut map = Map::new();
    map.insert("assetType".to_string(), normalize_str(&key.asset_type));
    map.insert("modelId".to_string(), normalize_str(&key.model_id));
    map.insert(
        "parameters".to_string(),
        normalize_value(&JsonValue::Object(key.parameters.clone())),
    );
    map.insert("prompt".to_string(), normalize_str(&key.prompt));
    map.insert("style".to_string(), normalize_str(&key.style));
    JsonValue::Object(map)
}

/// Recursively normalize a JSON value.
///
/// Map keys are left as-is; ordering is handled by canonical serialization.
pub fn normalize_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(n) => normalize_number(n),
        JsonValue::String(s) => normalize_str(s),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(normalize_value).collect()),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        JsonValue::Null | JsonValue::Bool(_) => value.clone(),
    }
}

fn normalize_str(s: &str) -> JsonValue {
    JsonValue::String(s.trim().to_lowercase())
}

fn normalize_number(n: &Number) -> JsonValue {
    let Some(f) = n.as_f64() else {
        return JsonValue::Number(n.clone());
    };

    let scale = 10f64.powi(NUMBER_PRECISION);
    let rounded = (f * scale).round() / scale;
    if !rounded.is_finite() {
        return JsonValue::Number(n.clone());
    }

    // 1, 1.0 and 1.00001 must all hash the same
    if rounded.fract() == 0.0 && rounded.abs() <= MAX_SAFE_INTEGER {
        return JsonValue::Number(Number::from(rounded as i64));
    }

    Number::from_f64(rounded)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::Number(n.clone()))
}

fn canonical_bytes(value: &JsonValue) -> Vec<u8> {
    // serde_json maps are BTreeMap-backed, so the plain encoding is sorted too
    serde_jcs::to_vec(value)
        .or_else(|_| serde_json::to_vec(value))
        .unwrap_or_default()
}
