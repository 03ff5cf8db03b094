//! In-memory store implementation for testing.
//!
//! [`MemoryStore`] implements [`KvStore`] without touching disk and lets
//! tests inject failures into specific operations.
//!
//! # Features
//!
//! - **Failure injection**: fail reads, single puts, or the Nth multi-put
//! - **Call recording**: the size of every multi-put is kept for assertions

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::kv::{KvStore, check_batch};

/// A [`KvStore`] held entirely in memory.
///
/// # Example
///
/// ```
/// use telldus_store::{KvStore, MemoryStore};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.put("settings", "CLIENT_KEY", &json!({ "value": "abc" })).unwrap();
/// assert_eq!(store.count("settings").unwrap(), 1);
///
/// store.fail_reads(true);
/// assert!(store.get("settings", "CLIENT_KEY").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<(String, String), Value>>,
    fail_reads: AtomicBool,
    fail_puts: AtomicBool,
    /// 1-based index of the multi-put call that should fail (0 = never).
    fail_put_multi_at: AtomicUsize,
    put_multi_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` fail as if the backend were unreachable.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every single-document `put` fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Fail the `n`th `put_multi` call from now on (1-based, 0 disables).
    ///
    /// The call counter is reset so `n` counts from this point.
    pub fn fail_put_multi_at(&self, n: usize) {
        self.put_multi_calls.store(0, Ordering::SeqCst);
        self.fail_put_multi_at.store(n, Ordering::SeqCst);
    }

    /// Sizes of all successful `put_multi` calls, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the recorded multi-put sizes.
    pub fn clear_batch_sizes(&self) {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All keys in a collection, sorted.
    pub fn keys(&self, collection: &str) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("injected read failure".to_string()));
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("injected put failure".to_string()));
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    fn put_multi(&self, collection: &str, entries: &[(String, Value)]) -> Result<()> {
        check_batch(entries)?;

        let call = self.put_multi_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_put_multi_at.load(Ordering::SeqCst) == call {
            return Err(Error::Unavailable(format!(
                "injected failure on multi-put #{call}"
            )));
        }

        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            map.insert((collection.to_string(), key.clone()), value.clone());
        }
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entries.len());
        Ok(())
    }

    fn count(&self, collection: &str) -> Result<u64> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("injected read failure".to_string()));
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().filter(|(c, _)| c == collection).count() as u64)
    }
}
