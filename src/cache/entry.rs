//! Value Envelope Module
//!
//! Defines the stored unit (payload + absolute expiry) and the TTL arithmetic.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cache::{ABSOLUTE_EXPIRY_THRESHOLD, HOUR_MS};

// == Envelope ==
/// A cached payload paired with the absolute time it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Expiration timestamp (Unix milliseconds)
    #[serde(deserialize_with = "deserialize_millis")]
    pub expiry_time: i64,
    /// The stored value; producers omit it for `undefined`, read back as null
    #[serde(default)]
    pub val: Value,
}

impl Envelope {
    // == Constructor ==
    pub fn new(val: Value, expiry_time: i64) -> Self {
        Self { expiry_time, val }
    }

    // == Is Valid ==
    /// Checks whether the envelope is still valid.
    ///
    /// An envelope is valid strictly before its expiry time; at the expiry
    /// instant it is already stale.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(current_timestamp_ms())
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expiry_time
    }

    // == Time To Live ==
    /// Returns remaining validity in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> i64 {
        (self.expiry_time - current_timestamp_ms()).max(0)
    }
}

// == Expiry Arithmetic ==
/// Turns a relative TTL in hours into an absolute timestamp.
///
/// A non-positive TTL yields `now_ms`, i.e. an envelope that is already stale.
pub fn compute_absolute_expiry(now_ms: i64, ttl_hours: f64) -> i64 {
    if ttl_hours > 0.0 {
        now_ms.saturating_add((ttl_hours * HOUR_MS as f64).round() as i64)
    } else {
        now_ms
    }
}

/// Resolves the overloaded `expiry` argument of `set`.
///
/// Values above [`ABSOLUTE_EXPIRY_THRESHOLD`] are Unix timestamps in seconds,
/// everything else is a relative TTL in hours.
pub fn resolve_expiry(now_ms: i64, expiry: f64) -> i64 {
    if expiry > ABSOLUTE_EXPIRY_THRESHOLD {
        (expiry * 1000.0).round() as i64
    } else {
        compute_absolute_expiry(now_ms, expiry)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// Documents written elsewhere may carry fractional millisecond values.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.round() as i64)
}
