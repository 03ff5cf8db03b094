//! Per-sensor watermark persistence.
//!
//! A watermark is the highest event timestamp already ingested for a sensor.
//! It is read before a sensor is synced to pick the fetch lower bound, and
//! written after all of that sensor's records are durable.

use std::sync::Arc;

use telldus_types::{Sensor, SensorInfo, WatermarkRecord};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;
use crate::kv::{KvStore, KvStoreExt};

/// Collection holding one [`WatermarkRecord`] per sensor, keyed by sensor id.
pub const WATERMARK_COLLECTION: &str = "sensors";

/// Read/advance access to sensor watermarks.
#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn KvStore>,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The persisted record for a sensor, if it was ever synced.
    pub fn record(&self, sensor_id: i64) -> Result<Option<WatermarkRecord>> {
        self.store
            .get_as(WATERMARK_COLLECTION, &sensor_id.to_string())
    }

    /// Merge a roster entry with its persisted watermark.
    ///
    /// A sensor with no record yet starts at `max_timestamp = 0`. The name
    /// always comes from the roster, which is the current source of truth.
    pub fn get(&self, info: &SensorInfo) -> Result<Sensor> {
        let sensor = match self.record(info.id)? {
            Some(record) => {
                Sensor::new(info.id, info.name.clone()).with_max_timestamp(record.max_timestamp)
            }
            None => {
                debug!("No watermark for sensor {}, starting from the beginning", info.id);
                Sensor::new(info.id, info.name.clone())
            }
        };
        Ok(sensor)
    }

    /// Persist a new watermark and return the updated sensor.
    ///
    /// The stored `max_timestamp` is the maximum of the value passed in, the
    /// sensor's in-memory value and whatever is already persisted, so it never
    /// moves backwards even when callers race or pass a stale value.
    pub fn advance(
        &self,
        sensor: &Sensor,
        new_max_timestamp: i64,
        sync_time: OffsetDateTime,
    ) -> Result<Sensor> {
        let persisted = self
            .record(sensor.id)?
            .map_or(0, |record| record.max_timestamp);
        let max_timestamp = new_max_timestamp.max(sensor.max_timestamp).max(persisted);

        let record = WatermarkRecord {
            sensor_id: sensor.id,
            name: sensor.name.clone(),
            max_timestamp,
            last_sync: sync_time,
        };
        self.store
            .put_as(WATERMARK_COLLECTION, &sensor.id.to_string(), &record)?;

        debug!(
            "Advanced watermark for {}: {} -> {}",
            sensor, sensor.max_timestamp, max_timestamp
        );

        Ok(sensor.with_max_timestamp(max_timestamp))
    }
}
