//! End-to-end sync scenarios against the mock remote.
//!
//! These run the full pipeline (roster, watermark, fetch, transform, chunked
//! write, watermark advance) without network access.

use std::sync::Arc;
use std::time::Duration;

use telldus_core::{MockSession, SyncError, SyncOptions, Syncer};
use telldus_store::{KvStore, MemoryStore, SqliteStore, WatermarkStore, readings_collection};
use telldus_types::{RawValue, Sensor};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn seed_watermark(store: Arc<dyn KvStore>, id: i64, name: &str, max_timestamp: i64) {
    WatermarkStore::new(store)
        .advance(&Sensor::new(id, name), max_timestamp, OffsetDateTime::now_utc())
        .unwrap();
}

fn push_many(session: &MockSession, sensor_id: i64, count: i64) {
    for ts in 1..=count {
        let value = format!("{}.5", ts % 30);
        session.push_event(sensor_id, ts, &[("temp", value.as_str().into())]);
    }
}

#[tokio::test]
async fn test_incremental_sync_from_watermark() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 500, &[("temp", "19.0".into())]);
    session.push_event(1, 2000, &[("temp", "21.5".into())]);
    seed_watermark(store.clone(), 1, "Kitchen", 1000);

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.summary(), "synced 1 sensor values");
    assert_eq!(session.requests()[1].params[1], ("from".to_string(), "1000".to_string()));

    let collection = readings_collection(1);
    assert_eq!(store.keys(&collection), vec!["temperature-2000".to_string()]);

    let doc = store.get(&collection, "temperature-2000").unwrap().unwrap();
    assert_eq!(doc["value"], 21.5);
    assert_eq!(doc["type"], "temperature");
    assert_eq!(doc["sensor_id"], 1);
    assert_eq!(doc["timestamp"], "1970-01-01T00:33:20Z");

    let record = syncer.watermarks().record(1).unwrap().unwrap();
    assert_eq!(record.max_timestamp, 2000);
    assert!(record.last_sync >= report.started_at && record.last_sync <= report.finished_at);

    // Records and watermark share the sensor's write time
    let created_at =
        OffsetDateTime::parse(doc["created_at"].as_str().unwrap(), &Rfc3339).unwrap();
    assert_eq!(created_at, record.last_sync);
}

#[tokio::test]
async fn test_cold_start_fetches_from_zero() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(4, "Garage");
    session.push_event(4, 10, &[("humidity", 55.0.into())]);

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    let history = &session.requests()[1];
    assert_eq!(history.params[1], ("from".to_string(), "0".to_string()));
    assert_eq!(report.sensors[0].previous_max_timestamp, 0);
    assert_eq!(report.sensors[0].max_timestamp, 10);
    assert_eq!(store.keys(&readings_collection(4)), vec!["humidity-10".to_string()]);
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 100, &[("temp", "20.0".into()), ("humidity", "41".into())]);
    session.push_event(1, 200, &[("temp", "20.5".into())]);

    let syncer = Syncer::new(session.clone(), store.clone());
    let first = syncer.run().await.unwrap();
    assert_eq!(first.written, 3);
    assert_eq!(first.new, 3);

    // The boundary event at 200 comes back and is overwritten in place
    let second = syncer.run().await.unwrap();
    assert_eq!(second.written, 1);
    assert_eq!(second.new, 0);
    assert_eq!(store.count(&readings_collection(1)).unwrap(), 3);
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 200);

    // New data after the watermark is picked up on the next run
    session.push_event(1, 300, &[("temp", "21.0".into())]);
    let third = syncer.run().await.unwrap();
    assert_eq!(third.written, 2);
    assert_eq!(third.new, 1);
    assert_eq!(store.count(&readings_collection(1)).unwrap(), 4);
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 300);
}

#[tokio::test]
async fn test_failed_sensor_does_not_block_others() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "A");
    session.add_sensor(2, "B");
    session.push_event(1, 100, &[("temp", "1".into())]);
    session.push_event(2, 100, &[("temp", "2".into())]);
    session.fail_history(1, 503, "maintenance");

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed_sensor_ids(), vec![1]);
    assert!(report.failures[0].error.contains("503"));
    assert_eq!(report.sensors.len(), 1);
    assert_eq!(report.sensors[0].sensor_id, 2);
    assert_eq!(report.written, 1);

    assert!(syncer.watermarks().record(1).unwrap().is_none());
    assert_eq!(store.count(&readings_collection(1)).unwrap(), 0);
    assert_eq!(syncer.watermarks().record(2).unwrap().unwrap().max_timestamp, 100);

    // Once the remote recovers, the failed sensor catches up from scratch
    session.clear_history_failure(1);
    let report = syncer.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 100);
}

#[tokio::test]
async fn test_failed_chunk_leaves_watermark_untouched() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    push_many(&session, 1, 1200);
    seed_watermark(store.clone(), 1, "Kitchen", 0);

    store.fail_put_multi_at(2);
    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    assert_eq!(report.failed_sensor_ids(), vec![1]);
    assert!(report.failures[0].error.contains("write readings"));
    // First chunk is durable, the rest never attempted
    assert_eq!(store.count(&readings_collection(1)).unwrap(), 500);
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 0);

    // The retry rewrites everything from the old watermark without duplicates
    store.fail_put_multi_at(0);
    store.clear_batch_sizes();
    let report = syncer.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written, 1200);
    assert_eq!(store.batch_sizes(), vec![500, 500, 200]);
    assert_eq!(store.count(&readings_collection(1)).unwrap(), 1200);
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 1200);
}

#[tokio::test]
async fn test_bad_value_is_skipped() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 100, &[("temp", "n/a".into()), ("humidity", " 40 ".into())]);
    session.push_event(1, 150, &[("temp", "-".into())]);

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    let outcome = &report.sensors[0];
    assert_eq!(outcome.fetched, 3);
    assert_eq!(outcome.written, 1);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(store.keys(&readings_collection(1)), vec!["humidity-100".to_string()]);
    // The watermark still covers the event whose only value was bad
    assert_eq!(outcome.max_timestamp, 150);
}

#[tokio::test]
async fn test_null_value_skips_only_that_reading() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 100, &[("temp", "20.5".into())]);
    session.push_event(
        1,
        200,
        &[
            ("temp", RawValue::Other(serde_json::Value::Null)),
            ("humidity", "40".into()),
        ],
    );
    session.push_event(1, 300, &[("temp", "21.0".into())]);

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.written, 3);
    assert_eq!(report.sensors[0].skipped, 1);
    assert_eq!(
        store.keys(&readings_collection(1)),
        vec![
            "humidity-200".to_string(),
            "temperature-100".to_string(),
            "temperature-300".to_string(),
        ]
    );
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 300);
}

#[tokio::test]
async fn test_non_finite_value_is_skipped() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 100, &[("temp", "NaN".into()), ("humidity", "inf".into())]);
    session.push_event(1, 200, &[("temp", "19.0".into())]);

    let report = Syncer::new(session.clone(), store.clone()).run().await.unwrap();

    assert_eq!(report.sensors[0].skipped, 2);
    assert_eq!(store.keys(&readings_collection(1)), vec!["temperature-200".to_string()]);
}

#[tokio::test]
async fn test_millisecond_timestamp_does_not_move_watermark() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 2000, &[("temp", "20.0".into())]);
    session.push_event(1, 1_700_000_000_000, &[("temp", "20.1".into())]);

    let syncer = Syncer::new(session.clone(), store.clone());
    let report = syncer.run().await.unwrap();

    assert_eq!(report.sensors[0].skipped, 1);
    assert_eq!(report.sensors[0].max_timestamp, 2000);
    assert_eq!(syncer.watermarks().record(1).unwrap().unwrap().max_timestamp, 2000);

    // Later history is still fetched
    session.push_event(1, 3000, &[("temp", "20.2".into())]);
    syncer.run().await.unwrap();
    let collection = readings_collection(1);
    assert!(store.get(&collection, "temperature-3000").unwrap().is_some());
}

#[tokio::test]
async fn test_sensors_use_disjoint_collections() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Inside");
    session.add_sensor(2, "Outside");
    session.push_event(1, 100, &[("temp", "21".into())]);
    session.push_event(2, 100, &[("temp", "-3".into())]);

    Syncer::new(session.clone(), store.clone()).run().await.unwrap();

    let inside = store.get(&readings_collection(1), "temperature-100").unwrap().unwrap();
    let outside = store.get(&readings_collection(2), "temperature-100").unwrap().unwrap();
    assert_eq!(inside["value"], 21.0);
    assert_eq!(outside["value"], -3.0);
}

#[tokio::test]
async fn test_second_run_while_running_is_rejected() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    session.add_sensor(1, "Kitchen");
    session.push_event(1, 100, &[("temp", "20".into())]);
    session.set_latency(1, Duration::from_millis(200));

    let syncer = Arc::new(Syncer::new(session.clone(), store.clone()));
    let background = {
        let syncer = syncer.clone();
        tokio::spawn(async move { syncer.run().await })
    };

    // Wait until the first run is parked inside the history call
    while session.history_calls(1) == 0 {
        tokio::task::yield_now().await;
    }

    assert!(syncer.is_running());
    assert!(matches!(syncer.run().await, Err(SyncError::AlreadyRunning)));

    let report = background.await.unwrap().unwrap();
    assert_eq!(report.written, 1);
    assert!(!syncer.is_running());
    assert_eq!(session.history_calls(1), 1);
}

#[tokio::test]
async fn test_concurrent_sensors_report_in_roster_order() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(MemoryStore::new());
    for id in 1..=3 {
        session.add_sensor(id, &format!("sensor-{id}"));
        session.push_event(id, 100 * id, &[("temp", "20".into())]);
    }
    // The first sensor finishes last
    session.set_latency(1, Duration::from_millis(100));
    session.set_latency(2, Duration::from_millis(10));

    let syncer = Syncer::with_options(
        session.clone(),
        store.clone(),
        SyncOptions {
            concurrency: 3,
            ..SyncOptions::default()
        },
    );
    let report = syncer.run().await.unwrap();

    let ids: Vec<i64> = report.sensors.iter().map(|s| s.sensor_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(report.written, 3);
    for id in 1..=3 {
        assert_eq!(
            syncer.watermarks().record(id).unwrap().unwrap().max_timestamp,
            100 * id
        );
    }
}

#[tokio::test]
async fn test_sync_into_sqlite() {
    let session = Arc::new(MockSession::new());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    session.add_sensor(8, "Cellar");
    push_many(&session, 8, 750);

    let syncer = Syncer::with_options(
        session.clone(),
        store.clone(),
        SyncOptions {
            batch_size: 100,
            concurrency: 1,
        },
    );
    let report = syncer.run().await.unwrap();
    assert_eq!(report.written, 750);
    assert_eq!(store.count(&readings_collection(8)).unwrap(), 750);

    let doc = store.get(&readings_collection(8), "temperature-750").unwrap().unwrap();
    assert_eq!(doc["value"], 0.5);

    // Overlap at the boundary only
    let report = syncer.run().await.unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(store.count(&readings_collection(8)).unwrap(), 750);
}
