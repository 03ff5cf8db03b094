//! Example: Incremental sync against a scripted remote
//!
//! Runs two syncs of a small mock roster into an in-memory SQLite store and
//! shows that the second run only re-reads from each sensor's watermark.
//!
//! Run with: `cargo run --example mock_sync`

use std::sync::Arc;

use telldus_core::{MockSession, Syncer};
use telldus_store::{KvStore, SqliteStore, readings_collection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let session = Arc::new(MockSession::new());
    session.add_sensor(101, "Living room");
    session.add_sensor(102, "Outdoor");
    for (i, ts) in (1_700_000_000..).step_by(600).take(5).enumerate() {
        let temp = format!("{:.1}", 20.0 + i as f64 * 0.2);
        session.push_event(101, ts, &[("temp", temp.as_str().into()), ("humidity", 45.0.into())]);
        session.push_event(102, ts, &[("temp", "-2.5".into())]);
    }

    let store = Arc::new(SqliteStore::open_in_memory()?);
    let syncer = Syncer::new(session.clone(), store.clone());

    let report = syncer.run().await?;
    println!("First run: {}", report.summary());
    for sensor in &report.sensors {
        println!(
            "  {} ({}): {} written, watermark {} -> {}",
            sensor.name,
            sensor.sensor_id,
            sensor.written,
            sensor.previous_max_timestamp,
            sensor.max_timestamp
        );
    }

    // One new event arrives for the outdoor sensor
    session.push_event(102, 1_700_003_000, &[("temp", "-3.0".into())]);

    let report = syncer.run().await?;
    println!("Second run: {}", report.summary());
    println!(
        "Stored: {} readings for 101, {} for 102",
        store.count(&readings_collection(101))?,
        store.count(&readings_collection(102))?
    );

    Ok(())
}
