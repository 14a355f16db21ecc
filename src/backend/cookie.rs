//! Cookie-based storage emulation.
//!
//! `CookieJar` behaves like a browser's `document.cookie`: cookies are
//! written one `name=value; expires=...` string at a time and read back as a
//! single `a=1; b=2` string. `CookieStorage` layers the backend contract on
//! top, keeping each item in one long-lived cookie.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use crate::backend::Backend;
use crate::error::{CacheError, Result};

#[derive(Debug, Clone, PartialEq)]
struct Cookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

impl Cookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(true, |expires| now < expires)
    }

    fn to_header(&self, name: &str) -> String {
        match self.expires {
            Some(expires) => format!("{}={}; expires={}", name, self.value, http_date(expires)),
            None => format!("{}={}", name, self.value),
        }
    }
}

// == Cookie Jar ==
/// Shared cookie jar, optionally persisted to a file.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<RwLock<BTreeMap<String, Cookie>>>,
    path: Option<PathBuf>,
}

impl CookieJar {
    /// A jar that lives only as long as the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// A jar persisted at `path`, loading any live cookies already there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let now = Utc::now();
        let mut cookies = BTreeMap::new();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for (name, cookie) in contents.lines().filter_map(parse_set_cookie) {
                    if cookie.is_live(now) {
                        cookies.insert(name, cookie);
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), cookies = cookies.len(), "Cookie jar opened");

        Ok(Self {
            cookies: Arc::new(RwLock::new(cookies)),
            path: Some(path),
        })
    }

    // == Set Cookie ==
    /// Applies one `name=value[; expires=<date>]` string.
    ///
    /// A cookie whose expiry is already in the past is deleted.
    pub fn set_cookie(&self, header: &str) -> Result<()> {
        let (name, cookie) = parse_set_cookie(header)
            .ok_or_else(|| CacheError::InvalidRequest(format!("malformed cookie: {header}")))?;

        let mut cookies = self.cookies.write().map_err(poisoned)?;
        if cookie.is_live(Utc::now()) {
            cookies.insert(name, cookie);
        } else {
            cookies.remove(&name);
        }
        self.persist(&cookies)
    }

    // == Cookie String ==
    /// All live cookies rendered as `name=value` pairs joined by `"; "`.
    pub fn cookie_string(&self) -> String {
        let now = Utc::now();
        let Ok(cookies) = self.cookies.read() else {
            return String::new();
        };
        cookies
            .iter()
            .filter(|(_, cookie)| cookie.is_live(now))
            .map(|(name, cookie)| format!("{}={}", name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Expiry of the named cookie, if it is set and has one.
    pub fn expires(&self, name: &str) -> Option<DateTime<Utc>> {
        self.cookies.read().ok()?.get(name)?.expires
    }

    fn persist(&self, cookies: &BTreeMap<String, Cookie>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = cookies
            .iter()
            .map(|(name, cookie)| cookie.to_header(name))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(path, contents)?;
        Ok(())
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Backend("cookie jar lock poisoned".to_string())
}

fn parse_set_cookie(header: &str) -> Option<(String, Cookie)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let expires = parts
        .filter_map(|attr| attr.split_once('='))
        .find(|(attr, _)| attr.trim().eq_ignore_ascii_case("expires"))
        .and_then(|(_, date)| DateTime::parse_from_rfc2822(date.trim()).ok())
        .map(|date| date.with_timezone(&Utc));

    Some((
        name.to_string(),
        Cookie {
            value: value.trim().to_string(),
            expires,
        },
    ))
}

/// Formats a timestamp the way cookies expect, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Adds `lifetime` to `now`, capped at the last instant an HTTP date with a
/// four-digit year can express.
fn cookie_expiry(now: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    // 9999-12-31T23:59:59Z
    let latest = Utc.timestamp_opt(253_402_300_799, 0).single().unwrap_or(now);
    now.checked_add_signed(lifetime).map_or(latest, |at| at.min(latest))
}

// == Cookie Storage ==
/// Backend that keeps every item in its own cookie with a fixed lifetime.
#[derive(Debug, Clone)]
pub struct CookieStorage {
    jar: CookieJar,
    lifetime: Duration,
}

impl CookieStorage {
    pub fn new(jar: CookieJar, lifetime: Duration) -> Self {
        Self { jar, lifetime }
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }
}

impl Backend for CookieStorage {
    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let expires = cookie_expiry(Utc::now(), self.lifetime);
        self.jar
            .set_cookie(&format!("{}={}; expires={}", key, value, http_date(expires)))
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .jar
            .cookie_string()
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| name.trim() == key)
            .map(|(_, value)| value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> CookieStorage {
        CookieStorage::new(CookieJar::new(), Duration::days(1000))
    }

    #[test]
    fn test_cookie_storage_roundtrip() {
        let mut cookies = storage();
        assert_eq!(cookies.get_item("dataRoot").unwrap(), None);

        cookies.set_item("dataRoot", "%7B%7D").unwrap();
        assert_eq!(cookies.get_item("dataRoot").unwrap().as_deref(), Some("%7B%7D"));
    }

    #[test]
    fn test_cookie_storage_overwrites_single_entry() {
        let mut cookies = storage();
        cookies.set_item("dataRoot", "first").unwrap();
        cookies.set_item("dataRoot", "second").unwrap();

        assert_eq!(cookies.jar().cookie_string(), "dataRoot=second");
    }

    #[test]
    fn test_lookup_ignores_other_cookies() {
        let jar = CookieJar::new();
        jar.set_cookie("alpha=1").unwrap();
        jar.set_cookie("zeta=2").unwrap();
        let mut cookies = CookieStorage::new(jar.clone(), Duration::days(1));
        cookies.set_item("dataRoot", "payload").unwrap();

        assert_eq!(jar.cookie_string(), "alpha=1; dataRoot=payload; zeta=2");
        // Keys after the first carry a leading space in the cookie string
        assert_eq!(cookies.get_item("dataRoot").unwrap().as_deref(), Some("payload"));
        assert_eq!(cookies.get_item("zeta").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_cookie_lifetime() {
        let mut cookies = storage();
        cookies.set_item("dataRoot", "v").unwrap();

        let expires = cookies.jar().expires("dataRoot").unwrap();
        let expected = Utc::now() + Duration::days(1000);
        assert!((expected - expires).num_seconds().abs() <= 2);
    }

    #[test]
    fn test_huge_lifetime_is_capped() {
        let jar = CookieJar::new();
        let mut cookies = CookieStorage::new(jar.clone(), Duration::days(100_000_000));
        cookies.set_item("dataRoot", "v").unwrap();

        let latest = DateTime::parse_from_rfc3339("9999-12-31T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(jar.expires("dataRoot"), Some(latest));
        assert_eq!(cookies.get_item("dataRoot").unwrap().as_deref(), Some("v"));

        let formatted = http_date(latest);
        assert_eq!(formatted, "Fri, 31 Dec 9999 23:59:59 GMT");
        let (_, cookie) = parse_set_cookie(&format!("k=v; expires={formatted}")).unwrap();
        assert_eq!(cookie.expires, Some(latest));
    }

    #[test]
    fn test_expired_cookie_is_deleted() {
        let jar = CookieJar::new();
        jar.set_cookie("k=v; expires=Tue, 15 Nov 2044 08:12:31 GMT").unwrap();
        assert_eq!(jar.cookie_string(), "k=v");

        jar.set_cookie("k=v; expires=Thu, 01 Jan 1970 00:00:00 GMT").unwrap();
        assert_eq!(jar.cookie_string(), "");
    }

    #[test]
    fn test_malformed_cookie_is_rejected() {
        let jar = CookieJar::new();
        assert!(jar.set_cookie("no-equals-sign").is_err());
        assert!(jar.set_cookie("=value").is_err());
    }

    #[test]
    fn test_http_date_parses_back() {
        let at = DateTime::parse_from_rfc3339("1994-11-15T08:12:31Z")
            .unwrap()
            .with_timezone(&Utc);
        let formatted = http_date(at);
        assert_eq!(formatted, "Tue, 15 Nov 1994 08:12:31 GMT");

        let (_, cookie) = parse_set_cookie(&format!("k=v; Expires={formatted}")).unwrap();
        assert_eq!(cookie.expires, Some(at));
    }

    #[test]
    fn test_file_backed_jar_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        let mut cookies = CookieStorage::new(CookieJar::open(&path).unwrap(), Duration::days(1));
        cookies.set_item("dataRoot", "persisted").unwrap();

        let reopened = CookieStorage::new(CookieJar::open(&path).unwrap(), Duration::days(1));
        assert_eq!(
            reopened.get_item("dataRoot").unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[test]
    fn test_reopen_drops_expired_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(
            &path,
            "old=1; expires=Thu, 01 Jan 1970 00:00:00 GMT\nfresh=2; expires=Tue, 15 Nov 2044 08:12:31 GMT",
        )
        .unwrap();

        let jar = CookieJar::open(&path).unwrap();
        assert_eq!(jar.cookie_string(), "fresh=2");
    }
}
