//! Sync orchestration.
//!
//! One run lists the remote roster, then for each sensor:
//!
//! 1. reads its watermark,
//! 2. fetches history from the watermark (inclusive),
//! 3. turns data points into keyed readings, skipping unparseable values,
//! 4. writes them in chunks to the sensor's readings collection,
//! 5. advances the watermark to the highest timestamp fetched.
//!
//! The watermark is only advanced after step 4 succeeded completely, so a
//! failure anywhere leaves the sensor to be retried from the same point.
//! A failure is confined to its sensor; the rest of the roster still runs.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use telldus_store::{BatchedWriter, KvStore, MAX_BATCH, WatermarkStore, readings_collection};
use telldus_types::{SensorInfo, to_reading};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SensorError, SyncError};
use crate::history::fetch_history;
use crate::sensors::list_sensors;
use crate::session::TelldusSession;

/// Tuning for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Records per durable multi-put, at most [`MAX_BATCH`].
    pub batch_size: usize,
    /// Sensors processed at the same time. `1` is strictly sequential.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH,
            concurrency: 1,
        }
    }
}

/// Result of one successfully synced sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorOutcome {
    pub sensor_id: i64,
    pub name: String,
    /// Data points returned by the remote.
    pub fetched: usize,
    /// Readings written to the store.
    pub written: usize,
    /// Written readings newer than the previous watermark.
    ///
    /// The event on the watermark itself is rewritten on every run and not
    /// counted here, so a run without new remote data reports `0`.
    pub new: usize,
    /// Data points dropped because their value could not be parsed.
    pub skipped: usize,
    pub previous_max_timestamp: i64,
    pub max_timestamp: i64,
}

/// A sensor whose pipeline aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorFailure {
    pub sensor_id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    /// Readings written across all sensors.
    pub written: usize,
    /// Readings newer than their sensor's previous watermark.
    pub new: usize,
    /// Successful sensors, in roster order.
    pub sensors: Vec<SensorOutcome>,
    /// Failed sensors, in roster order.
    pub failures: Vec<SensorFailure>,
}

impl SyncReport {
    /// Whether every sensor in the roster synced.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_sensor_ids(&self) -> Vec<i64> {
        self.failures.iter().map(|f| f.sensor_id).collect()
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!("synced {} sensor values", self.written)
    }
}

/// Runs incremental syncs from a [`TelldusSession`] into a [`KvStore`].
///
/// Only one run executes at a time per `Syncer`; a concurrent [`run`]
/// fails immediately with [`SyncError::AlreadyRunning`].
///
/// [`run`]: Syncer::run
pub struct Syncer {
    session: Arc<dyn TelldusSession>,
    watermarks: WatermarkStore,
    writer: BatchedWriter,
    options: SyncOptions,
    run_lock: Mutex<()>,
}

impl Syncer {
    pub fn new(session: Arc<dyn TelldusSession>, store: Arc<dyn KvStore>) -> Self {
        Self::with_options(session, store, SyncOptions::default())
    }

    pub fn with_options(
        session: Arc<dyn TelldusSession>,
        store: Arc<dyn KvStore>,
        options: SyncOptions,
    ) -> Self {
        let writer = BatchedWriter::new(store.clone()).with_batch_size(options.batch_size);
        let options = SyncOptions {
            batch_size: writer.batch_size(),
            concurrency: options.concurrency.max(1),
        };
        Self {
            session,
            watermarks: WatermarkStore::new(store),
            writer,
            options,
            run_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// Whether a run currently holds the run lock.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Sync every sensor in the remote roster once.
    pub async fn run(&self) -> Result<SyncReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let started_at = OffsetDateTime::now_utc();
        let roster = list_sensors(self.session.as_ref())
            .await
            .map_err(SyncError::ListSensors)?;
        info!("Syncing {} sensors", roster.len());

        let results: Vec<_> = stream::iter(roster)
            .map(|info| async move {
                let result = self.sync_sensor(&info).await;
                (info, result)
            })
            .buffered(self.options.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            started_at,
            finished_at: started_at,
            written: 0,
            new: 0,
            sensors: Vec::new(),
            failures: Vec::new(),
        };

        for (info, result) in results {
            match result {
                Ok(outcome) => {
                    report.written += outcome.written;
                    report.new += outcome.new;
                    report.sensors.push(outcome);
                }
                Err(e) => {
                    warn!("Sync failed for sensor {}: {}", info.id, e);
                    report.failures.push(SensorFailure {
                        sensor_id: info.id,
                        name: info.name,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.finished_at = OffsetDateTime::now_utc();
        if report.is_complete() {
            info!("{}", report.summary());
        } else {
            warn!(
                "{} ({} sensors failed: {:?})",
                report.summary(),
                report.failures.len(),
                report.failed_sensor_ids()
            );
        }

        Ok(report)
    }

    async fn sync_sensor(
        &self,
        info: &SensorInfo,
    ) -> std::result::Result<SensorOutcome, SensorError> {
        // Shared by every record of this sensor and its watermark
        let created_at = OffsetDateTime::now_utc();
        let sensor = self
            .watermarks
            .get(info)
            .map_err(SensorError::StorageRead)?;

        let history = fetch_history(self.session.as_ref(), &sensor).await?;
        let fetched = history.reading_count();
        // Includes events whose values are all skipped: they were seen.
        // Timestamps that are not valid unix seconds never count.
        let new_max = history.max_timestamp().unwrap_or(sensor.max_timestamp);

        let writer = self.writer.clone();
        let collection = readings_collection(sensor.id);
        let label = sensor.to_string();
        let cold = sensor.is_cold();
        let previous_max = sensor.max_timestamp;

        let (written, new, skipped) = tokio::task::spawn_blocking(move || {
            let mut new = 0;
            let mut skipped = 0;
            let records = history
                .into_readings()
                .filter_map(|raw| match to_reading(&raw, created_at) {
                    Ok(record) => {
                        if cold || raw.ts > previous_max {
                            new += 1;
                        }
                        Some(record)
                    }
                    Err(e) => {
                        warn!("Skipping reading from {} at {}: {}", label, raw.ts, e);
                        skipped += 1;
                        None
                    }
                });
            let written = writer.write_all(&collection, records)?;
            Ok::<_, telldus_store::Error>((written, new, skipped))
        })
        .await
        .map_err(|e| SensorError::Task(e.to_string()))?
        .map_err(SensorError::StorageWrite)?;

        debug!("Wrote {} readings for {}", written, sensor);

        let advanced = self
            .watermarks
            .advance(&sensor, new_max, created_at)
            .map_err(SensorError::WatermarkWrite)?;

        info!(
            "Synced {}: {} written ({} new), {} skipped, watermark {} -> {}",
            sensor, written, new, skipped, sensor.max_timestamp, advanced.max_timestamp
        );

        Ok(SensorOutcome {
            sensor_id: sensor.id,
            name: sensor.name.clone(),
            fetched,
            written,
            new,
            skipped,
            previous_max_timestamp: sensor.max_timestamp,
            max_timestamp: advanced.max_timestamp,
        })
    }
}
