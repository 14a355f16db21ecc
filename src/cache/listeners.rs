//! Listener Registry Module
//!
//! Per-key change callbacks, invoked in registration order after each write.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::error;

/// Callback invoked with the new value of a key.
pub type Listener = Box<dyn Fn(&Value) + Send + Sync>;

/// Handle returned on registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// == Listener Registry ==
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Appends a callback for `key`. The same callback may be registered
    /// more than once and will then run once per registration.
    pub fn register(&mut self, key: impl Into<String>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(key.into())
            .or_default()
            .push((id, listener));
        id
    }

    // == Unregister ==
    pub fn unregister(&mut self, key: &str, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    // == Notify ==
    /// Runs every callback registered for `key`.
    ///
    /// A panicking callback is logged and skipped; the remaining callbacks
    /// still run. Returns how many callbacks completed normally.
    pub fn notify(&self, key: &str, value: &Value) -> usize {
        let Some(entries) = self.listeners.get(key) else {
            return 0;
        };

        let mut completed = 0;
        for (id, listener) in entries {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => completed += 1,
                Err(_) => error!(key, listener = id.0, "Listener panicked during notification"),
            }
        }
        completed
    }

    /// Number of callbacks registered for `key`.
    pub fn count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(key, entries)| (key.as_str(), entries.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}
