//! Durable storage for Telldus sensor sync.
//!
//! This crate provides a small key-value abstraction ([`KvStore`]) with a
//! SQLite backend for production and an in-memory backend for tests, plus
//! the two sync-specific components built on top of it:
//!
//! - [`WatermarkStore`]: per-sensor high-water marks, monotonic on advance
//! - [`BatchedWriter`]: streams records into bounded multi-put chunks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use telldus_store::{BatchedWriter, KvStore, SqliteStore, WatermarkStore};
//! use telldus_types::SensorInfo;
//!
//! let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open_default()?);
//! let watermarks = WatermarkStore::new(store.clone());
//! let sensor = watermarks.get(&SensorInfo { id: 1, name: "Porch".into() })?;
//!
//! let writer = BatchedWriter::new(store);
//! let records = vec![("temperature-2000".to_string(), 21.5)];
//! let written = writer.write_all("sensor_values/1", records)?;
//! # Ok::<(), telldus_store::Error>(())
//! ```

mod error;
mod kv;
mod memory;
mod schema;
mod settings;
mod store;
mod watermark;
mod writer;

pub use error::{Error, Result};
pub use kv::{KvStore, KvStoreExt, MAX_BATCH};
pub use memory::MemoryStore;
pub use settings::{SETTINGS_COLLECTION, get_setting, set_setting};
pub use store::SqliteStore;
pub use watermark::{WATERMARK_COLLECTION, WatermarkStore};
pub use writer::BatchedWriter;

/// Collection prefix for stored readings.
pub const READINGS_COLLECTION: &str = "sensor_values";

/// Collection holding the readings of one sensor.
///
/// Reading keys (`<type>-<ts>`) are only unique per sensor, so each sensor
/// gets its own collection.
pub fn readings_collection(sensor_id: i64) -> String {
    format!("{READINGS_COLLECTION}/{sensor_id}")
}

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/telldus-sync/data.db`
/// - macOS: `~/Library/Application Support/telldus-sync/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\telldus-sync\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("telldus-sync")
        .join("data.db")
}
