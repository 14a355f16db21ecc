//! API Handlers
//!
//! HTTP request handlers for each cache host endpoint.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{CookieJar, DurableStore, FileStore};
use crate::cache::StorageManager;
use crate::config::{ServerConfig, StoreConfig};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
};

/// Application state shared across all handlers.
///
/// The storage manager is single-threaded by design, so every request goes
/// through one lock around the whole manager.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe storage manager
    pub cache: Arc<RwLock<StorageManager>>,
}

impl AppState {
    /// Creates a new AppState around the given storage manager.
    pub fn new(cache: StorageManager) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the file store and cookie jar, lets the probe pick between them
    /// and registers a logging listener for every watched key. Failing to
    /// open either store only narrows the choice; it never aborts startup.
    pub fn from_config(config: &ServerConfig) -> Self {
        let durable: Option<Box<dyn DurableStore>> = match FileStore::open(&config.storage_dir) {
            Ok(store) => Some(Box::new(store)),
            Err(e) => {
                warn!(dir = %config.storage_dir.display(), error = %e, "Cannot open file store");
                None
            }
        };

        let jar = match &config.cookie_file {
            Some(path) => CookieJar::open(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Cannot open cookie file, keeping cookies in memory");
                CookieJar::new()
            }),
            None => CookieJar::new(),
        };

        let mut cache = StorageManager::open(durable, jar, StoreConfig::default());
        for key in &config.watch_keys {
            let watched = key.clone();
            cache.listener(key.clone(), move |value: &Value| {
                info!(key = %watched, %value, "Watched key changed");
            });
        }

        Self::new(cache)
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional expiry.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut cache = state.cache.write().await;
    cache.set(req.key.clone(), req.value, req.expiry);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. Absent and expired keys are 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let cache = state.cache.read().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.remove(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.write().await.clear();
    Json(ClearResponse::new())
}

/// Handler for GET /health
///
/// Reports the selected backend and the number of stored entries.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.cache.read().await;
    Json(HealthResponse::healthy(cache.backend_kind(), cache.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, MemoryStore, Storage};
    use serde_json::json;

    fn test_state() -> AppState {
        let storage = Storage::Durable(Box::new(MemoryStore::new()));
        AppState::new(StorageManager::new(storage, StoreConfig::default()))
    }

    fn set_request(key: &str, value: Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            expiry: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let result = set_handler(
            State(state.clone()),
            Json(set_request("test_key", json!({"v": 1}))),
        )
        .await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_expired_key() {
        let state = test_state();
        let mut req = set_request("stale", json!("v"));
        req.expiry = Some(0.0);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let result = get_handler(State(state), Path("stale".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        set_handler(State(state.clone()), Json(set_request("to_delete", json!(1))))
            .await
            .unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state();
        set_handler(State(state.clone()), Json(set_request("a", json!(1))))
            .await
            .unwrap();

        clear_handler(State(state.clone())).await;
        assert!(state.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.backend, BackendKind::Durable);
        assert_eq!(response.entries, 0);
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_handler(State(state), Json(set_request("", json!("value")))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_from_config_uses_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_dir: dir.path().join("store"),
            watch_keys: vec!["token".to_string()],
            ..ServerConfig::default()
        };

        let state = AppState::from_config(&config);
        let cache = state.cache.read().await;
        assert_eq!(cache.backend_kind(), BackendKind::Durable);
    }

    #[tokio::test]
    async fn test_from_config_falls_back_to_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();
        let config = ServerConfig {
            storage_dir: blocked,
            cookie_file: Some(dir.path().join("cookies.txt")),
            ..ServerConfig::default()
        };

        let state = AppState::from_config(&config);
        state.cache.write().await.set("k", "v", None);
        assert_eq!(state.cache.read().await.backend_kind(), BackendKind::Cookie);

        let contents = std::fs::read_to_string(dir.path().join("cookies.txt")).unwrap();
        assert!(contents.starts_with("dataRoot="));
    }
}
