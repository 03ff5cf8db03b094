//! Record key derivation.
//!
//! Every stored reading is keyed by `<type>-<ts>`, where `type` is the
//! normalized measurement name. Re-syncing an overlapping time range derives
//! the same keys and overwrites the same records.

use time::OffsetDateTime;

use crate::error::{ParseResult, ValueParseError};
use crate::types::{RawReading, RawValue, SensorReading};

/// Measurement name aliases applied before keying.
const ALIASES: &[(&str, &str)] = &[("temp", "temperature")];

/// Map a remote measurement name to its stored type.
///
/// Unknown names pass through unchanged.
pub fn normalize(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |&(_, canonical)| canonical)
}

/// Derive the dedup key for one reading.
///
/// The key depends only on `ts` and the measurement name; the sensor scope
/// comes from the collection the record is written to.
pub fn derive_key(_sensor_id: i64, ts: i64, name: &str) -> String {
    format!("{}-{}", normalize(name), ts)
}

/// Coerce a raw value to a finite `f64`.
///
/// `NaN` and infinities are rejected: they have no JSON representation and
/// would be stored as `null`.
pub fn parse_value(name: &str, value: &RawValue) -> ParseResult<f64> {
    let parsed = match value {
        RawValue::Number(n) => Some(*n),
        RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        RawValue::Other(_) => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValueParseError::NotNumeric {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Convert an event time in unix seconds to a datetime.
pub fn to_datetime(ts: i64) -> ParseResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts).map_err(|_| ValueParseError::TimestampOutOfRange(ts))
}

/// Convert a raw reading into its key and persisted form.
pub fn to_reading(
    raw: &RawReading,
    created_at: OffsetDateTime,
) -> ParseResult<(String, SensorReading)> {
    let timestamp = to_datetime(raw.ts)?;
    let value = parse_value(&raw.name, &raw.value)?;
    let kind = normalize(&raw.name).to_string();

    Ok((
        derive_key(raw.sensor_id, raw.ts, &raw.name),
        SensorReading {
            sensor_id: raw.sensor_id,
            timestamp,
            kind,
            value,
            created_at,
        },
    ))
}
