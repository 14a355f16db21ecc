//! Cache Document Module
//!
//! The whole cache is persisted as one document: provenance fields plus the
//! `root` map of envelopes. It is stored as percent-encoded JSON so any
//! backend can hold it as a single opaque string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::Envelope;
use crate::config::StoreConfig;
use crate::error::Result;

/// Mapping from cache key to envelope.
pub type Root = BTreeMap<String, Envelope>;

// == Cache Document ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub version: String,
    pub auth: String,
    pub mail: String,
    pub root: Root,
}

impl CacheDocument {
    /// Creates an empty document carrying the configured provenance.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            version: config.version.clone(),
            auth: config.auth.clone(),
            mail: config.mail.clone(),
            root: Root::new(),
        }
    }
}

// Only `root` is read back; provenance always comes from the running config.
#[derive(Deserialize)]
struct PersistedDocument {
    #[serde(default)]
    root: Root,
}

// == Encode ==
/// Serializes the full document into a backend-safe string.
pub fn encode(document: &CacheDocument) -> Result<String> {
    let json = serde_json::to_string(document)?;
    Ok(urlencoding::encode(&json).into_owned())
}

// == Decode ==
/// Recovers `root` from a persisted string.
///
/// Missing or undecodable input yields an empty root.
pub fn decode(raw: Option<&str>) -> Root {
    let Some(raw) = raw else {
        return Root::new();
    };

    let json = match urlencoding::decode(raw) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Persisted cache document is not valid percent-encoding, starting empty");
            return Root::new();
        }
    };

    match serde_json::from_str::<PersistedDocument>(&json) {
        Ok(document) => document.root,
        Err(e) => {
            warn!(error = %e, "Persisted cache document is corrupt, starting empty");
            Root::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_document() -> CacheDocument {
        let mut document = CacheDocument::new(&StoreConfig::default());
        document.root.insert(
            "session".to_string(),
            Envelope::new(json!({"token": "a;b=c", "ids": [1, 2, 3]}), 99),
        );
        document
            .root
            .insert("flag".to_string(), Envelope::new(json!(true), 100));
        document
    }

    #[test]
    fn test_encode_is_cookie_safe() {
        let encoded = encode(&sample_document()).unwrap();
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains('='));
        assert!(!encoded.contains(' '));
    }

    #[test]
    fn test_decode_recovers_root() {
        let document = sample_document();
        let encoded = encode(&document).unwrap();
        assert_eq!(decode(Some(&encoded)), document.root);
    }

    #[test]
    fn test_decode_missing_value() {
        assert!(decode(None).is_empty());
    }

    #[test]
    fn test_decode_corrupt_value() {
        assert!(decode(Some("not%20json")).is_empty());
        assert!(decode(Some("%E0%A4%A")).is_empty());
        assert!(decode(Some("")).is_empty());
    }

    #[test]
    fn test_decode_without_root_field() {
        let encoded = urlencoding::encode(r#"{"version":"1.0.0"}"#).into_owned();
        assert!(decode(Some(&encoded)).is_empty());
    }

    #[test]
    fn test_decode_unencoded_json() {
        // Plain JSON without reserved characters decodes unchanged
        let raw = r#"{"root":{"k":{"expiryTime":5,"val":"v"}}}"#;
        let root = decode(Some(raw));
        assert_eq!(root.get("k"), Some(&Envelope::new(json!("v"), 5)));
    }

    #[test]
    fn test_decode_entry_without_val_keeps_siblings() {
        let raw = r#"{"root":{"keep":{"expiryTime":5,"val":"x"},"undef":{"expiryTime":6}}}"#;
        let root = decode(Some(raw));

        assert_eq!(root.len(), 2);
        assert_eq!(root.get("keep"), Some(&Envelope::new(json!("x"), 5)));
        assert_eq!(root.get("undef"), Some(&Envelope::new(Value::Null, 6)));
    }

    #[test]
    fn test_floats_survive_encoding() {
        let floats = [
            1.0715660391465826e-75,
            -1.81996730402717e-179,
            -1.603964615428183e143,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            f64::MAX,
        ];

        let mut document = CacheDocument::new(&StoreConfig::default());
        for (i, f) in floats.iter().enumerate() {
            document
                .root
                .insert(format!("f{i}"), Envelope::new(json!(f), 1));
        }

        let root = decode(Some(&encode(&document).unwrap()));
        for (i, f) in floats.iter().enumerate() {
            let decoded = root[&format!("f{i}")].val.as_f64().unwrap();
            assert_eq!(decoded.to_bits(), f.to_bits(), "float {f} changed");
        }
    }

    #[test]
    fn test_document_wire_shape() {
        let document = CacheDocument::new(&StoreConfig::default());
        let wire = serde_json::to_value(&document).unwrap();
        assert!(wire.get("version").is_some());
        assert!(wire.get("auth").is_some());
        assert!(wire.get("mail").is_some());
        assert_eq!(wire["root"], json!({}));
    }
}
