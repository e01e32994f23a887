//! Priority, expiration and eviction-order policy.
//!
//! Pure functions only; no locking and no filesystem access.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::fingerprint::Fingerprint;

/// Priorities closer than this are ordered by recency instead.
pub const PRIORITY_TIE_BAND: f64 = 10.0;

/// Upper bound of the access boost factor.
const MAX_ACCESS_BOOST: f64 = 2.0;

/// Boost per recorded access.
const ACCESS_BOOST_STEP: f64 = 0.1;

/// Generation time (ms) that earns one priority point, capped below.
const GENERATION_MS_PER_POINT: f64 = 1000.0;
const MAX_GENERATION_POINTS: f64 = 20.0;

/// Share of the quality score in the initial priority.
const QUALITY_WEIGHT: f64 = 0.8;

/// Initial priority of a fresh entry.
///
/// Mostly quality, plus a bonus for assets that were slow to produce.
pub fn initial_priority(quality_score: f64, generation_time_ms: u64) -> f64 {
    let quality = clamp_score(quality_score);
    let cost = (generation_time_ms as f64 / GENERATION_MS_PER_POINT).min(MAX_GENERATION_POINTS);
    clamp_score(quality * QUALITY_WEIGHT + cost)
}

/// Priority after an access bringing the count to `access_count`.
pub fn boosted_priority(priority: f64, access_count: u64) -> f64 {
    let factor = (1.0 + access_count as f64 * ACCESS_BOOST_STEP).min(MAX_ACCESS_BOOST);
    (priority * factor).min(100.0)
}

/// Quality-weighted expiration time.
///
/// `base_ttl * (1 + quality/100 * (multiplier_max - 1))` after `created_at`,
/// never less than one millisecond later.
pub fn compute_expires_at(
    created_at: DateTime<Utc>,
    quality_score: f64,
    base_ttl: StdDuration,
    multiplier_max: f64,
) -> DateTime<Utc> {
    let quality = clamp_score(quality_score);
    let multiplier = if multiplier_max.is_finite() {
        multiplier_max.max(1.0)
    } else {
        1.0
    };
    let factor = 1.0 + (quality / 100.0) * (multiplier - 1.0);
    let ttl_ms = (base_ttl.as_millis() as f64 * factor).round().max(1.0);
    let ttl = Duration::try_milliseconds(ttl_ms.min(i64::MAX as f64) as i64)
        .unwrap_or_else(|| Duration::days(365 * 100));
    created_at
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True iff an expiration is set and `now` is past it.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| now > at)
}

/// What the eviction policy needs to know about a memory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionCandidate {
    pub fingerprint: Fingerprint,
    pub priority: f64,
    pub last_accessed_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Eviction order, first victim first, produced lazily.
///
/// Repeatedly takes the lowest remaining priority, then among everything
/// within [`PRIORITY_TIE_BAND`] of it picks the least recently accessed.
/// The band comparison is not transitive, so this is a selection rather
/// than a `sort_by`.
pub fn eviction_order(candidates: Vec<EvictionCandidate>) -> EvictionOrder {
    EvictionOrder::new(candidates)
}

/// Iterator returned by [`eviction_order`].
///
/// Candidates are sorted by priority once. Since the lowest remaining
/// priority only grows, the band ceiling only grows too: entries are pushed
/// into a recency heap as the ceiling reaches them and each pick is a heap
/// pop, so taking `k` victims costs `O(n log n + k log n)`.
#[derive(Debug)]
pub struct EvictionOrder {
    slots: Vec<Option<EvictionCandidate>>,
    band: BinaryHeap<Reverse<(DateTime<Utc>, Fingerprint, usize)>>,
    /// First slot not yet picked.
    lowest: usize,
    /// First slot not yet pushed into `band`.
    admitted: usize,
}

impl EvictionOrder {
    fn new(mut candidates: Vec<EvictionCandidate>) -> Self {
        candidates.sort_by(|a, b| {
            a.priority
                .total_cmp(&b.priority)
                .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Self {
            slots: candidates.into_iter().map(Some).collect(),
            band: BinaryHeap::new(),
            lowest: 0,
            admitted: 0,
        }
    }
}

impl Iterator for EvictionOrder {
    type Item = EvictionCandidate;

    fn next(&mut self) -> Option<EvictionCandidate> {
        while self.slots.get(self.lowest).is_some_and(Option::is_none) {
            self.lowest += 1;
        }
        let floor = self.slots.get(self.lowest)?.as_ref()?.priority;

        let ceiling = floor + PRIORITY_TIE_BAND;
        while let Some(Some(next)) = self.slots.get(self.admitted) {
            if next.priority > ceiling {
                break;
            }
            self.band.push(Reverse((
                next.last_accessed_at,
                next.fingerprint.clone(),
                self.admitted,
            )));
            self.admitted += 1;
        }

        let Reverse((_, _, index)) = self.band.pop()?;
        self.slots[index].take()
    }
}

/// Pick victims in eviction order until `bytes_to_free` is reached.
pub fn select_victims(candidates: Vec<EvictionCandidate>, bytes_to_free: u64) -> Vec<EvictionCandidate> {
    let mut victims = Vec::new();
    if bytes_to_free == 0 {
        return victims;
    }
    let mut freed = 0u64;
    for candidate in eviction_order(candidates) {
        freed = freed.saturating_add(candidate.size_bytes);
        victims.push(candidate);
        if freed >= bytes_to_free {
            break;
        }
    }
    victims
}

/// Clamp to 0-100, mapping NaN to 0.
pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}
