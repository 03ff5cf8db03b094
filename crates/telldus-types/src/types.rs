//! Core types for Telldus sensor history.
//!
//! The remote API describes sensors and their history; the types here carry
//! that data from the wire, through the record keyer, into the store.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A sensor known to the sync, together with its watermark.
///
/// `Sensor` is an immutable value: advancing the watermark produces a new
/// value through [`Sensor::with_max_timestamp`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sensor {
    /// Remote sensor identifier.
    pub id: i64,
    /// Human-readable sensor name as reported by the remote API.
    pub name: String,
    /// Highest event timestamp (unix seconds) already ingested.
    ///
    /// `0` means the sensor has never been synced.
    pub max_timestamp: i64,
}

impl Sensor {
    /// Create a sensor that has never been synced.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            max_timestamp: 0,
        }
    }

    /// Return a copy of this sensor with a different watermark.
    #[must_use]
    pub fn with_max_timestamp(&self, max_timestamp: i64) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            max_timestamp,
        }
    }

    /// Whether this sensor has no watermark yet.
    pub fn is_cold(&self) -> bool {
        self.max_timestamp == 0
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "sensor {}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// One entry of the remote sensor roster.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorInfo {
    /// Remote sensor identifier.
    ///
    /// The remote API sends ids as JSON strings; plain numbers are accepted too.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "de::flexible_i64"))]
    pub id: i64,
    /// Sensor name, empty when the remote does not report one.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "de::nullable_string"))]
    pub name: String,
}

/// A single history event as returned by the remote API.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// Event time in unix seconds.
    pub ts: i64,
    /// Measurements recorded at this instant.
    #[cfg_attr(feature = "serde", serde(default))]
    pub data: Vec<DataPoint>,
}

/// One named measurement inside a [`RawEvent`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataPoint {
    /// Measurement name as sent by the remote (e.g. `"temp"`).
    pub name: String,
    /// Measurement value, a number or a numeric string.
    ///
    /// A missing value decodes as JSON `null`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: RawValue,
}

/// A measurement value before numeric coercion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Anything else the remote sent (`null`, a bool, an object). Never
    /// parses as a measurement.
    Other(serde_json::Value),
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::Other(serde_json::Value::Null)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(s) => f.write_str(s),
            RawValue::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// A data point flattened out of its event, tagged with sensor and time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub sensor_id: i64,
    pub ts: i64,
    pub name: String,
    pub value: RawValue,
}

/// A reading as persisted in the store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// Sensor that produced the reading.
    pub sensor_id: i64,
    /// When the measurement was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Normalized measurement type (e.g. `"temperature"`).
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    /// Measurement value.
    pub value: f64,
    /// Start time of the sync run that wrote this record.
    ///
    /// Overwritten on re-sync; not part of the record identity.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
}

/// Persisted watermark state for one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WatermarkRecord {
    pub sensor_id: i64,
    pub name: String,
    /// Highest event timestamp ingested (unix seconds). Never decreases.
    pub max_timestamp: i64,
    /// When the sensor was last synced successfully.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_sync: OffsetDateTime,
}

impl WatermarkRecord {
    /// The in-memory sensor described by this record.
    pub fn to_sensor(&self) -> Sensor {
        Sensor {
            id: self.sensor_id,
            name: self.name.clone(),
            max_timestamp: self.max_timestamp,
        }
    }
}

#[cfg(feature = "serde")]
mod de {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Int(i64),
        Str(String),
    }

    pub fn flexible_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match StringOrInt::deserialize(deserializer)? {
            StringOrInt::Int(v) => Ok(v),
            StringOrInt::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid sensor id: {s:?}"))),
        }
    }

    pub fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }
}
