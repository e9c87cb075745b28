// crates/retro_host/src/variables.rs

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};

/// Config-variable table answering the core's keyed lookups.
///
/// Values configured by the embedder win over defaults the core announces
/// via SET_VARIABLES (where the value string has the form
/// `"Description; option1|option2"` and the first option is the default).
/// Unknown keys are declined; the core must tolerate that.
///
/// A returned value pointer stays valid until that key is overwritten,
/// matching the foreign contract that the value is only good until the next
/// variable query.
pub(crate) struct OptionStore {
    values: Mutex<HashMap<String, CString>>,
    dirty: AtomicBool,
}

impl OptionStore {
    pub(crate) fn new(configured: &HashMap<String, String>) -> Self {
        let mut values = HashMap::new();
        for (key, value) in configured {
            match CString::new(value.as_str()) {
                Ok(c) => {
                    values.insert(key.clone(), c);
                }
                Err(_) => warn!(key, "ignoring configured option containing NUL"),
            }
        }
        Self {
            dirty: AtomicBool::new(!values.is_empty()),
            values: Mutex::new(values),
        }
    }

    /// Record a variable announced by the core, keeping any embedder-
    /// configured value for the same key.
    pub(crate) fn register_announced(&self, key: &str, spec: &str) {
        let default = first_option(spec);
        let Ok(c) = CString::new(default) else {
            return;
        };
        let mut values = lock(&self.values);
        if !values.contains_key(key) {
            debug!(key, default, "core-announced variable registered");
            values.insert(key.to_string(), c);
        }
    }

    /// Pointer to the stored value for `key`, or `None` to decline.
    pub(crate) fn value_ptr(&self, key: &str) -> Option<*const c_char> {
        lock(&self.values).get(key).map(|c| c.as_ptr())
    }

    /// Embedder-facing override; flips the update flag the core polls.
    pub(crate) fn set(&self, key: &str, value: &str) {
        let Ok(c) = CString::new(value) else {
            warn!(key, "rejecting option value containing NUL");
            return;
        };
        lock(&self.values).insert(key.to_string(), c);
        self.dirty.store(true, Ordering::Release);
    }

    /// True once per change set: reports and clears the dirty flag.
    pub(crate) fn take_update_flag(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

/// `"Description; opt1|opt2"` -> `"opt1"`. Tolerates missing parts.
fn first_option(spec: &str) -> &str {
    let after_desc = match spec.split_once(';') {
        Some((_, rest)) => rest.trim_start(),
        None => spec,
    };
    after_desc.split('|').next().unwrap_or("").trim()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_value_wins_over_announcement() {
        let mut cfg = HashMap::new();
        cfg.insert("palette".to_string(), "grayscale".to_string());
        let store = OptionStore::new(&cfg);
        store.register_announced("palette", "Palette; classic|grayscale");

        let ptr = store.value_ptr("palette").unwrap();
        let got = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(got, "grayscale");
    }

    #[test]
    fn unknown_key_declines() {
        let store = OptionStore::new(&HashMap::new());
        assert!(store.value_ptr("nope").is_none());
    }

    #[test]
    fn announcement_default_is_first_pipe_option() {
        assert_eq!(first_option("Scaling; 1x|2x|4x"), "1x");
        assert_eq!(first_option("no-description"), "no-description");
        assert_eq!(first_option("Desc; single"), "single");
    }

    #[test]
    fn update_flag_reports_once() {
        let store = OptionStore::new(&HashMap::new());
        assert!(!store.take_update_flag());
        store.set("key", "value");
        assert!(store.take_update_flag());
        assert!(!store.take_update_flag());
    }
}
