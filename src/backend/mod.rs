//! Backend Module
//!
//! String key/value stores the cache document is persisted into, and the
//! probe that picks one of them at startup.

mod cookie;
mod file;
mod memory;
pub mod probe;

use std::fmt;

use serde::Serialize;

use crate::error::Result;

pub use cookie::{CookieJar, CookieStorage};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use probe::{is_usable, select_backend};

// == Backend Traits ==
/// Minimal contract every persistence mechanism satisfies.
pub trait Backend: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Reads the value under `key`, `None` if nothing is stored.
    fn get_item(&self, key: &str) -> Result<Option<String>>;
}

/// A real key/value store, as opposed to the cookie emulation.
pub trait DurableStore: Backend {
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

// == Backend Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Durable,
    Cookie,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Durable => f.write_str("durable"),
            BackendKind::Cookie => f.write_str("cookie"),
        }
    }
}

// == Storage ==
/// The backend chosen by the probe, fixed for the manager's lifetime.
pub enum Storage {
    Durable(Box<dyn DurableStore>),
    Cookie(CookieStorage),
}

impl Storage {
    pub fn kind(&self) -> BackendKind {
        match self {
            Storage::Durable(_) => BackendKind::Durable,
            Storage::Cookie(_) => BackendKind::Cookie,
        }
    }
}

impl Backend for Storage {
    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        match self {
            Storage::Durable(store) => store.set_item(key, value),
            Storage::Cookie(cookies) => cookies.set_item(key, value),
        }
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match self {
            Storage::Durable(store) => store.get_item(key),
            Storage::Cookie(cookies) => cookies.get_item(key),
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Storage").field(&self.kind()).finish()
    }
}
