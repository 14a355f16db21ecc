//! Backend Probe
//!
//! Decides once, at startup, whether the durable store can be trusted.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, warn};

use crate::backend::{CookieStorage, DurableStore, Storage};
use crate::error::Result;

/// Checks that `store` round-trips a random token under `probe_key`.
///
/// Any error along the way counts as "unusable"; nothing is propagated.
pub fn is_usable(store: &mut dyn DurableStore, probe_key: &str) -> bool {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();

    match round_trip(store, probe_key, &token) {
        Ok(true) => true,
        Ok(false) => {
            warn!(probe_key, "Durable store returned a different probe value");
            false
        }
        Err(e) => {
            warn!(probe_key, error = %e, "Durable store probe failed");
            false
        }
    }
}

fn round_trip(store: &mut dyn DurableStore, probe_key: &str, token: &str) -> Result<bool> {
    store.set_item(probe_key, token)?;
    let read_back = store.get_item(probe_key)?;
    store.remove_item(probe_key)?;
    Ok(read_back.as_deref() == Some(token))
}

/// Picks the durable store when it is present and passes the probe,
/// otherwise the cookie emulation.
pub fn select_backend(
    durable: Option<Box<dyn DurableStore>>,
    cookies: CookieStorage,
    probe_key: &str,
) -> Storage {
    match durable {
        Some(mut store) => {
            if is_usable(store.as_mut(), probe_key) {
                info!("Durable store passed the probe, using it as cache backend");
                Storage::Durable(store)
            } else {
                info!("Falling back to cookie storage");
                Storage::Cookie(cookies)
            }
        }
        None => {
            info!("No durable store available, using cookie storage");
            Storage::Cookie(cookies)
        }
    }
}
