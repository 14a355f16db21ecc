//! Cache Module
//!
//! Provides the persisted key/value cache with per-key TTL and change listeners.

pub mod document;
mod entry;
mod listeners;
mod store;


// Re-export public types
pub use document::{CacheDocument, Root};
pub use entry::{compute_absolute_expiry, current_timestamp_ms, resolve_expiry, Envelope};
pub use listeners::{Listener, ListenerId, ListenerRegistry};
pub use store::StorageManager;

// == Public Constants ==
/// One hour in milliseconds
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Default relative TTL in hours (~1000 days)
pub const DEFAULT_TTL_HOURS: f64 = 24_000.0;

/// Default TTL as a millisecond duration
pub const DEFAULT_TTL_MS: i64 = 24_000 * HOUR_MS;

/// `expiry` values above this are absolute Unix seconds rather than hours
pub const ABSOLUTE_EXPIRY_THRESHOLD: f64 = 300_000.0;
