//! Sensor history fetcher.
//!
//! One `sensor/history` query per sensor, bounded below by the sensor's
//! watermark. The remote treats `from` as inclusive, so the event sitting
//! exactly on the watermark comes back on every run; the record keys make
//! that overlap an overwrite.
//!
//! The whole history is returned in a single response. There is no paging
//! loop: if the remote ever truncates large backlogs, the tail is picked up
//! by the next run because the watermark only advances to what was seen.

use serde::Deserialize;
use telldus_types::{RawEvent, RawReading, Sensor, to_datetime};
use tracing::debug;

use crate::error::RemoteFetchError;
use crate::session::TelldusSession;

pub(crate) const SENSOR_HISTORY: &str = "sensor/history";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<RawEvent>,
}

/// Events fetched for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorHistory {
    pub sensor_id: i64,
    pub events: Vec<RawEvent>,
}

impl SensorHistory {
    /// Number of data points across all events.
    pub fn reading_count(&self) -> usize {
        self.events.iter().map(|e| e.data.len()).sum()
    }

    /// Highest representable event timestamp, if any.
    ///
    /// Events whose `ts` is not a valid unix time in seconds are ignored, so
    /// a stray millisecond timestamp cannot push the watermark into the far
    /// future.
    pub fn max_timestamp(&self) -> Option<i64> {
        self.events
            .iter()
            .map(|e| e.ts)
            .filter(|&ts| to_datetime(ts).is_ok())
            .max()
    }

    /// Flatten events into readings, lazily.
    ///
    /// Events keep their source order, as do data points within an event.
    pub fn into_readings(self) -> impl Iterator<Item = RawReading> {
        let sensor_id = self.sensor_id;
        self.events.into_iter().flat_map(move |event| {
            let ts = event.ts;
            event.data.into_iter().map(move |point| RawReading {
                sensor_id,
                ts,
                name: point.name,
                value: point.value,
            })
        })
    }
}

/// Fetch every event at or after `sensor.max_timestamp`.
pub async fn fetch_history(
    session: &dyn TelldusSession,
    sensor: &Sensor,
) -> Result<SensorHistory, RemoteFetchError> {
    let params = [
        ("id", sensor.id.to_string()),
        ("from", sensor.max_timestamp.to_string()),
    ];
    let response = session.get(SENSOR_HISTORY, &params).await?;
    let history: HistoryResponse = response.into_json()?;

    debug!(
        "Fetched {} events for {} from {}",
        history.history.len(),
        sensor,
        sensor.max_timestamp
    );

    Ok(SensorHistory {
        sensor_id: sensor.id,
        events: history.history,
    })
}
