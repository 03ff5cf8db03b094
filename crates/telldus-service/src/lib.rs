//! HTTP trigger and cron entry point for Telldus Live sensor sync.
//!
//! The `telldus-sync` binary either serves an HTTP endpoint that runs one
//! sync per request, or runs a single sync and exits (for cron).
//!
//! # HTTP Endpoints
//!
//! - `GET /sync` - Run a sync; `200 synced N sensor values`, `207` on partial failure
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Run state and the last run's report
//! - `GET /api/sensors/{id}` - Persisted watermark for a sensor
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/telldus-sync/config.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/telldus-sync/data.db"
//!
//! [telldus]
//! base_url = "https://api.telldus.com/json"
//! timeout_secs = 30
//! concurrency = 1
//! batch_size = 500
//! ```
//!
//! OAuth credentials (`client_key`, `client_secret`, `resource_owner_key`,
//! `resource_owner_secret`) may be set under `[telldus]`; any that are not
//! are read from the database's `settings` collection (`CLIENT_KEY`, ...).

pub mod api;
pub mod config;
pub mod state;

pub use config::{
    Config, ConfigError, ServerConfig, StorageConfig, TelldusConfig, ValidationError,
    default_config_path,
};
pub use state::AppState;
