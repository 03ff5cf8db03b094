//! Application state shared across handlers.

use std::sync::Arc;

use telldus_core::{SyncError, SyncReport, Syncer, TelldusSession};
use telldus_store::KvStore;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The durable store readings, watermarks and settings live in.
    pub store: Arc<dyn KvStore>,
    /// The sync orchestrator. Holds the run lock.
    pub syncer: Syncer,
    /// Configuration the service was started with.
    pub config: Config,
    /// Report of the most recent completed run, if any.
    pub last_report: RwLock<Option<SyncReport>>,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    pub fn new(
        store: Arc<dyn KvStore>,
        session: Arc<dyn TelldusSession>,
        config: Config,
    ) -> Arc<Self> {
        let syncer = Syncer::with_options(session, store.clone(), config.telldus.sync_options());
        Arc::new(Self {
            store,
            syncer,
            config,
            last_report: RwLock::new(None),
            started_at: OffsetDateTime::now_utc(),
        })
    }

    /// Run one sync and remember its report.
    pub async fn run_sync(&self) -> Result<SyncReport, SyncError> {
        let report = self.syncer.run().await?;
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telldus_core::MockSession;
    use telldus_store::MemoryStore;

    #[tokio::test]
    async fn test_run_sync_records_report() {
        let session = Arc::new(MockSession::new());
        session.add_sensor(1, "Kitchen");
        session.push_event(1, 100, &[("temp", "20".into())]);
        let state = AppState::new(Arc::new(MemoryStore::new()), session, Config::default());

        assert!(state.last_report.read().await.is_none());
        let report = state.run_sync().await.unwrap();
        assert_eq!(state.last_report.read().await.as_ref(), Some(&report));
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_report() {
        let session = Arc::new(MockSession::new());
        let state = AppState::new(Arc::new(MemoryStore::new()), session.clone(), Config::default());

        let first = state.run_sync().await.unwrap();
        session.fail_list(500, "down");
        assert!(state.run_sync().await.is_err());
        assert_eq!(state.last_report.read().await.as_ref(), Some(&first));
    }

    #[test]
    fn test_sync_options_from_config() {
        let mut config = Config::default();
        config.telldus.concurrency = 3;
        config.telldus.batch_size = 100;
        let session = Arc::new(MockSession::new());
        let state = AppState::new(Arc::new(MemoryStore::new()), session, config);
        assert_eq!(state.syncer.options().concurrency, 3);
        assert_eq!(state.syncer.options().batch_size, 100);
    }
}
