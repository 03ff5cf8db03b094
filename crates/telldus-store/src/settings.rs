//! Deployment settings kept in the store.
//!
//! Each setting is a document `{"value": "..."}` in the `settings`
//! collection, keyed by its upper-case name (e.g. `CLIENT_KEY`).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kv::{KvStore, KvStoreExt};

/// Collection holding deployment settings.
pub const SETTINGS_COLLECTION: &str = "settings";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingDocument {
    value: String,
}

/// Look up a setting. Missing settings and empty values read as `None`.
pub fn get_setting(store: &dyn KvStore, name: &str) -> Result<Option<String>> {
    let doc: Option<SettingDocument> = store.get_as(SETTINGS_COLLECTION, name)?;
    Ok(doc.map(|d| d.value).filter(|v| !v.is_empty()))
}

/// Store a setting.
pub fn set_setting(store: &dyn KvStore, name: &str, value: &str) -> Result<()> {
    store.put_as(
        SETTINGS_COLLECTION,
        name,
        &SettingDocument {
            value: value.to_string(),
        },
    )
}
