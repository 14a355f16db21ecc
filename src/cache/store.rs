//! Storage Manager Module
//!
//! Public cache API. Owns the in-memory document, mirrors it to the selected
//! backend after every mutation and notifies listeners after each write.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{select_backend, Backend, BackendKind, CookieJar, CookieStorage, DurableStore, Storage};
use crate::cache::document::{self, CacheDocument};
use crate::cache::{
    compute_absolute_expiry, current_timestamp_ms, resolve_expiry, Envelope, ListenerId,
    ListenerRegistry,
};
use crate::config::StoreConfig;

// == Storage Manager ==
/// Cross-session key/value cache with per-key expiry.
///
/// Reads are served from memory; the backend is read once, at construction.
/// Callers never see backend faults: they are logged and the in-memory state
/// stays authoritative.
#[derive(Debug)]
pub struct StorageManager {
    document: CacheDocument,
    storage: Storage,
    listeners: ListenerRegistry,
    config: StoreConfig,
}

impl StorageManager {
    // == Constructors ==
    /// Creates a manager over an already selected backend and hydrates it.
    pub fn new(storage: Storage, config: StoreConfig) -> Self {
        let raw = match storage.get_item(&config.document_key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(backend = %storage.kind(), error = %e, "Failed to read persisted cache document");
                None
            }
        };

        let mut document = CacheDocument::new(&config);
        document.root = document::decode(raw.as_deref());
        info!(
            backend = %storage.kind(),
            entries = document.root.len(),
            "Cache hydrated"
        );

        Self {
            document,
            storage,
            listeners: ListenerRegistry::new(),
            config,
        }
    }

    /// Probes `durable`, falls back to cookies in `jar` if it is missing or
    /// unusable, then hydrates.
    pub fn open(durable: Option<Box<dyn DurableStore>>, jar: CookieJar, config: StoreConfig) -> Self {
        let cookies = CookieStorage::new(jar, config.cookie_lifetime);
        let storage = select_backend(durable, cookies, &config.probe_key);
        Self::new(storage, config)
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `expiry` above [`ABSOLUTE_EXPIRY_THRESHOLD`](crate::cache::ABSOLUTE_EXPIRY_THRESHOLD)
    /// is an absolute Unix timestamp in seconds, otherwise a TTL in hours.
    /// Without it the configured default TTL applies. Always returns `true`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>, expiry: Option<f64>) -> bool {
        let now = current_timestamp_ms();
        let expiry_time = match expiry {
            Some(expiry) => resolve_expiry(now, expiry),
            None => compute_absolute_expiry(now, self.config.default_ttl_hours),
        };
        self.insert(key.into(), Envelope::new(value.into(), expiry_time))
    }

    /// Stores `value` for `ttl` from now. A non-positive TTL stores an
    /// already-expired entry.
    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: impl Into<Value>, ttl: Duration) -> bool {
        let expiry_time = current_timestamp_ms().saturating_add(ttl.num_milliseconds().max(0));
        self.insert(key.into(), Envelope::new(value.into(), expiry_time))
    }

    /// Stores `value` until the instant `at`.
    pub fn set_with_absolute_expiry(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        at: DateTime<Utc>,
    ) -> bool {
        self.insert(key.into(), Envelope::new(value.into(), at.timestamp_millis()))
    }

    fn insert(&mut self, key: String, envelope: Envelope) -> bool {
        debug!(key = %key, expiry_time = envelope.expiry_time, "Setting cache entry");
        self.document.root.insert(key.clone(), envelope);
        self.persist();

        if let Some(stored) = self.document.root.get(&key) {
            self.listeners.notify(&key, &stored.val);
        }
        true
    }

    // == Get ==
    /// Returns an owned copy of the value if present and not expired.
    ///
    /// Expired entries are left in place until removed or overwritten.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.document
            .root
            .get(key)
            .filter(|envelope| envelope.is_valid())
            .map(|envelope| envelope.val.clone())
    }

    /// Like [`get`](Self::get), deserializing into `T`. A value of the wrong
    /// shape reads as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key, error = %e, "Cached value does not match requested type");
                None
            }
        }
    }

    /// The stored envelope, expired or not.
    pub fn envelope(&self, key: &str) -> Option<&Envelope> {
        self.document.root.get(key)
    }

    // == Remove ==
    /// Removes `key`. Returns `false`, without touching the backend, if it
    /// was not stored.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.document.root.remove(key).is_none() {
            return false;
        }
        debug!(key, "Removed cache entry");
        self.persist();
        true
    }

    // == Clear ==
    /// Drops every entry. Listener registrations are kept.
    pub fn clear(&mut self) -> bool {
        debug!(entries = self.document.root.len(), "Clearing cache");
        self.document.root.clear();
        self.persist();
        true
    }

    // == Listeners ==
    /// Registers `callback` to run with the new value after each `set` of `key`.
    pub fn listener<F>(&mut self, key: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.register(key, Box::new(callback))
    }

    /// Removes a registration made with [`listener`](Self::listener).
    pub fn unlisten(&mut self, key: &str, id: ListenerId) -> bool {
        self.listeners.unregister(key, id)
    }

    // == Introspection ==
    pub fn backend_kind(&self) -> BackendKind {
        self.storage.kind()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.document.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.root.is_empty()
    }

    // == Persist ==
    fn persist(&mut self) {
        let encoded = match document::encode(&self.document) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "Failed to encode cache document");
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&self.config.document_key, &encoded) {
            warn!(backend = %self.storage.kind(), error = %e, "Failed to persist cache document");
        }
    }
}
