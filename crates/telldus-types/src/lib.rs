//! Value types for syncing Telldus sensor history.
//!
//! This crate holds the data model shared by the store, the remote client
//! and the sync orchestrator, plus the pure record keyer that makes repeated
//! syncs idempotent.
//!
//! # Example
//!
//! ```
//! use telldus_types::{RawReading, derive_key, to_reading};
//! use time::OffsetDateTime;
//!
//! assert_eq!(derive_key(1, 2000, "temp"), "temperature-2000");
//!
//! let raw = RawReading { sensor_id: 1, ts: 2000, name: "temp".into(), value: "21.5".into() };
//! let (key, reading) = to_reading(&raw, OffsetDateTime::now_utc()).unwrap();
//! assert_eq!(key, "temperature-2000");
//! assert_eq!(reading.value, 21.5);
//! ```

pub mod error;
pub mod key;
pub mod types;

pub use error::{ParseResult, ValueParseError};
pub use key::{derive_key, normalize, parse_value, to_datetime, to_reading};
pub use types::{
    DataPoint, RawEvent, RawReading, RawValue, Sensor, SensorInfo, SensorReading, WatermarkRecord,
};
