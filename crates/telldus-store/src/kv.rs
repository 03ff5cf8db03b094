//! The key-value capability every backend provides.
//!
//! Values are JSON documents addressed by `(collection, key)`. Writes to an
//! existing key replace the previous document, which is what makes re-syncing
//! an overlapping range idempotent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Maximum number of entries accepted by a single [`KvStore::put_multi`] call.
pub const MAX_BATCH: usize = 500;

/// A durable key-value store.
///
/// Implementations must be safe to share between tasks. A `get` for a key
/// that was never written returns `Ok(None)`; errors are reserved for a store
/// that cannot answer.
pub trait KvStore: Send + Sync {
    /// Fetch one document.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Insert or replace one document.
    fn put(&self, collection: &str, key: &str, value: &Value) -> Result<()>;

    /// Insert or replace up to [`MAX_BATCH`] documents in one call.
    ///
    /// Batches larger than the limit fail with [`Error::BatchTooLarge`]
    /// before anything is written.
    fn put_multi(&self, collection: &str, entries: &[(String, Value)]) -> Result<()>;

    /// Number of documents in a collection.
    fn count(&self, collection: &str) -> Result<u64>;
}

/// Typed helpers on top of [`KvStore`].
pub trait KvStoreExt: KvStore {
    /// Fetch and deserialize one document.
    fn get_as<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        match self.get(collection, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store one document.
    fn put_as<T: Serialize>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.put(collection, key, &value)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Reject batches over the per-call limit.
pub(crate) fn check_batch(entries: &[(String, Value)]) -> Result<()> {
    if entries.len() > MAX_BATCH {
        return Err(Error::BatchTooLarge {
            len: entries.len(),
            max: MAX_BATCH,
        });
    }
    Ok(())
}
