//! Incremental sync of Telldus Live sensor history.
//!
//! This crate pulls measurement history from the Telldus Live API and writes
//! it into a [`telldus_store::KvStore`], resuming each sensor from the last
//! timestamp it ingested.
//!
//! # Features
//!
//! - **OAuth 1.0a session**: HMAC-SHA1 signed requests against Telldus Live
//! - **Incremental fetch**: per-sensor watermarks bound every history query
//! - **Idempotent writes**: readings keyed by `<type>-<ts>`, so re-syncs overwrite
//! - **Failure isolation**: one sensor failing never stops the others
//! - **Mock remote**: [`MockSession`] for tests without network access
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use telldus_core::{Credentials, OAuthSession, Syncer};
//! use telldus_store::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("client-key", "client-secret", "token", "token-secret");
//!     let session = OAuthSession::new(
//!         telldus_core::DEFAULT_BASE_URL,
//!         credentials,
//!         Duration::from_secs(30),
//!     )?;
//!     let store = SqliteStore::open_default()?;
//!
//!     let syncer = Syncer::new(Arc::new(session), Arc::new(store));
//!     let report = syncer.run().await?;
//!     println!("{}", report.summary());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod history;
pub mod mock;
pub mod oauth;
pub mod sensors;
pub mod session;
pub mod sync;

pub use error::{RemoteFetchError, Result, SensorError, SyncError};
pub use history::{SensorHistory, fetch_history};
pub use mock::{MockSession, RecordedRequest};
pub use oauth::{Credentials, DEFAULT_BASE_URL, OAuthSession};
pub use sensors::list_sensors;
pub use session::{ApiResponse, TelldusSession};
pub use sync::{SensorFailure, SensorOutcome, SyncOptions, SyncReport, Syncer};

// Re-export the data types and store so callers need only one dependency
pub use telldus_store;
pub use telldus_types;
