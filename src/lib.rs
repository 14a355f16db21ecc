//! Local Cache - A cross-session key/value cache
//!
//! Persists a JSON document of expiring entries to a durable store when one
//! is usable, falling back to a cookie emulation otherwise, and notifies
//! per-key listeners on every write.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use backend::{BackendKind, CookieJar, FileStore, MemoryStore};
pub use cache::{ListenerId, StorageManager};
pub use config::{ServerConfig, StoreConfig};
pub use error::{CacheError, Result};
