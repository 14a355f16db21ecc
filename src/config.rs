//! Configuration Module
//!
//! `StoreConfig` tunes the storage manager itself; `ServerConfig` is loaded
//! from environment variables by the HTTP host.

use std::env;
use std::path::PathBuf;

use chrono::Duration;

use crate::cache::DEFAULT_TTL_HOURS;

/// Storage manager configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend key the whole cache document is persisted under
    pub document_key: String,
    /// Private key used by the backend probe
    pub probe_key: String,
    /// Relative TTL in hours applied when `set` is called without an expiry
    pub default_ttl_hours: f64,
    /// How long the cookie emulation keeps its single cookie alive
    pub cookie_lifetime: Duration,
    /// Provenance written into every persisted document
    pub version: String,
    pub auth: String,
    pub mail: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_key: "dataRoot".to_string(),
            probe_key: "checkStorage".to_string(),
            default_ttl_hours: DEFAULT_TTL_HOURS,
            cookie_lifetime: Duration::days(1000),
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth: env!("CARGO_PKG_AUTHORS").to_string(),
            mail: contact_mail(env!("CARGO_PKG_AUTHORS")),
        }
    }
}

/// Picks the contact for the `mail` provenance field out of a Cargo
/// authors list (`Name <address>:Other`).
///
/// Uses the first `<address>` found, else the first author as written.
fn contact_mail(authors: &str) -> String {
    let addresses = authors.split(':').find_map(|author| {
        let (_, rest) = author.split_once('<')?;
        let (address, _) = rest.split_once('>')?;
        Some(address.trim())
    });
    addresses
        .filter(|a| !a.is_empty())
        .or_else(|| authors.split(':').map(str::trim).find(|a| !a.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

/// HTTP host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Directory used by the durable file store
    pub storage_dir: PathBuf,
    /// File backing the cookie jar; `None` keeps cookies in memory
    pub cookie_file: Option<PathBuf>,
    /// Keys whose changes are logged through listeners
    pub watch_keys: Vec<String>,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STORAGE_DIR` - Durable store directory (default: `.local_cache`)
    /// - `COOKIE_FILE` - Cookie jar file (default: unset, in-memory jar)
    /// - `WATCH_KEYS` - Comma-separated keys to log changes for (default: none)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".local_cache")),
            cookie_file: env::var("COOKIE_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            watch_keys: env::var("WATCH_KEYS")
                .map(|v| parse_watch_keys(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            storage_dir: PathBuf::from(".local_cache"),
            cookie_file: None,
            watch_keys: Vec::new(),
        }
    }
}

fn parse_watch_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
