//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telldus_core::{Credentials, DEFAULT_BASE_URL, SyncOptions};
use telldus_store::{KvStore, MAX_BATCH, get_setting};

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Remote API settings.
    pub telldus: TelldusConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use telldus_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.telldus.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new("server.bind", "bind address cannot be empty"));
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                Ok(_) => {}
                Err(_) => errors.push(ValidationError::new(
                    "server.bind",
                    format!("invalid port '{}': must be a number 1-65535", port),
                )),
            },
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: telldus_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new("storage.path", "database path cannot be empty"));
        }
        errors
    }
}

/// Maximum per-request timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 300;
/// Maximum number of sensors synced in parallel.
pub const MAX_CONCURRENCY: usize = 16;

/// Telldus Live API configuration.
///
/// Credential fields are optional here; anything left out is read from the
/// store's `settings` collection when the service starts.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelldusConfig {
    /// API root URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Sensors synced in parallel.
    pub concurrency: usize,
    /// Records per durable write.
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_owner_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_owner_secret: Option<String>,
}

impl Default for TelldusConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            concurrency: 1,
            batch_size: MAX_BATCH,
            client_key: None,
            client_secret: None,
            resource_owner_key: None,
            resource_owner_secret: None,
        }
    }
}

impl std::fmt::Debug for TelldusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("TelldusConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("batch_size", &self.batch_size)
            .field("client_key", &self.client_key)
            .field("client_secret", &redact(&self.client_secret))
            .field("resource_owner_key", &self.resource_owner_key)
            .field("resource_owner_secret", &redact(&self.resource_owner_secret))
            .finish()
    }
}

impl TelldusConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            errors.push(ValidationError::new(
                "telldus.base_url",
                format!("'{}' must start with http:// or https://", self.base_url),
            ));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            errors.push(ValidationError::new(
                "telldus.timeout_secs",
                format!(
                    "timeout {} is out of range (1-{} seconds)",
                    self.timeout_secs, MAX_TIMEOUT_SECS
                ),
            ));
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            errors.push(ValidationError::new(
                "telldus.concurrency",
                format!(
                    "concurrency {} is out of range (1-{})",
                    self.concurrency, MAX_CONCURRENCY
                ),
            ));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH {
            errors.push(ValidationError::new(
                "telldus.batch_size",
                format!(
                    "batch size {} is out of range (1-{})",
                    self.batch_size, MAX_BATCH
                ),
            ));
        }

        for (field, value) in self.credential_fields() {
            if value.is_some_and(str::is_empty) {
                errors.push(ValidationError::new(
                    format!("telldus.{field}"),
                    "credential cannot be empty string (omit it to use the settings store)",
                ));
            }
        }

        errors
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
        }
    }

    fn credential_fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("client_key", self.client_key.as_deref()),
            ("client_secret", self.client_secret.as_deref()),
            ("resource_owner_key", self.resource_owner_key.as_deref()),
            ("resource_owner_secret", self.resource_owner_secret.as_deref()),
        ]
    }

    /// Resolve OAuth credentials.
    ///
    /// Each credential comes from this config if set, otherwise from the
    /// `settings` collection (`CLIENT_KEY`, `CLIENT_SECRET`,
    /// `RESOURCE_OWNER_KEY`, `RESOURCE_OWNER_SECRET`).
    pub fn credentials(&self, store: &dyn KvStore) -> Result<Credentials, ConfigError> {
        let [client_key, client_secret, resource_owner_key, resource_owner_secret] =
            self.credential_fields().map(|(field, value)| {
                let setting = field.to_ascii_uppercase();
                match value.filter(|v| !v.is_empty()) {
                    Some(v) => Ok(v.to_string()),
                    None => get_setting(store, &setting)
                        .map_err(ConfigError::Settings)?
                        .ok_or(ConfigError::MissingCredential { field, setting }),
                }
            });

        Ok(Credentials::new(
            client_key?,
            client_secret?,
            resource_owner_key?,
            resource_owner_secret?,
        ))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error("Missing credential: set telldus.{field} or the {setting} setting")]
    MissingCredential {
        field: &'static str,
        setting: String,
    },
    #[error("Failed to read settings: {0}")]
    Settings(#[source] telldus_store::Error),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `telldus.batch_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telldus-sync")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use telldus_store::{MemoryStore, set_setting};

    fn store_with_settings(names: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for name in names {
            set_setting(&store, name, &format!("{}-value", name.to_lowercase())).unwrap();
        }
        store
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.telldus.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.telldus.batch_size, 500);
        assert_eq!(config.telldus.concurrency, 1);
        assert!(config.telldus.client_key.is_none());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9000".to_string();
        config.telldus.concurrency = 4;
        config.telldus.client_key = Some("ck".to_string());
        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "192.168.1.1:8888"

            [storage]
            path = "/data/telldus.db"

            [telldus]
            base_url = "https://pa-api.telldus.com/json"
            timeout_secs = 10
            concurrency = 2
            batch_size = 250
            client_key = "ck"
            client_secret = "cs"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "192.168.1.1:8888");
        assert_eq!(config.storage.path, PathBuf::from("/data/telldus.db"));
        assert_eq!(config.telldus.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.telldus.sync_options(),
            SyncOptions {
                batch_size: 250,
                concurrency: 2
            }
        );
        assert_eq!(config.telldus.client_secret.as_deref(), Some("cs"));
        assert!(config.telldus.resource_owner_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[telldus]\nconcurrency = 3\n").unwrap();
        assert_eq!(config.telldus.concurrency, 3);
        assert_eq!(config.telldus.timeout_secs, 30);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("telldus-sync/config.toml"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        for bind in ["127.0.0.1:8080", "[::1]:8080", "localhost:8080"] {
            let config = ServerConfig {
                bind: bind.to_string(),
            };
            assert!(config.validate().is_empty(), "{bind}");
        }

        for (bind, expected) in [
            ("", "cannot be empty"),
            ("127.0.0.1", "host:port"),
            ("127.0.0.1:0", "cannot be 0"),
            ("127.0.0.1:abc", "must be a number"),
        ] {
            let errors = ServerConfig {
                bind: bind.to_string(),
            }
            .validate();
            assert_eq!(errors.len(), 1, "{bind}");
            assert!(errors[0].message.contains(expected), "{bind}");
        }
    }

    #[test]
    fn test_storage_path_validation() {
        let empty = StorageConfig {
            path: PathBuf::new(),
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.path");
    }

    #[test]
    fn test_telldus_validation() {
        let config = TelldusConfig {
            base_url: "api.telldus.com".to_string(),
            timeout_secs: 0,
            concurrency: 100,
            batch_size: 501,
            client_secret: Some(String::new()),
            ..TelldusConfig::default()
        };
        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "telldus.base_url",
                "telldus.timeout_secs",
                "telldus.concurrency",
                "telldus.batch_size",
                "telldus.client_secret",
            ]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let mut config = Config::default();
        config.telldus.batch_size = 0;
        let err = config.validate().unwrap_err();
        let display = err.to_string();
        assert!(display.contains("validation failed"));
        assert!(display.contains("telldus.batch_size"));
    }

    #[test]
    fn test_credentials_from_settings() {
        let store = store_with_settings(&[
            "CLIENT_KEY",
            "CLIENT_SECRET",
            "RESOURCE_OWNER_KEY",
            "RESOURCE_OWNER_SECRET",
        ]);
        let credentials = TelldusConfig::default().credentials(&store).unwrap();
        assert_eq!(credentials.client_key, "client_key-value");
        assert_eq!(credentials.resource_owner_secret, "resource_owner_secret-value");
    }

    #[test]
    fn test_config_credentials_take_precedence() {
        let store =
            store_with_settings(&["CLIENT_SECRET", "RESOURCE_OWNER_KEY", "RESOURCE_OWNER_SECRET"]);
        let config = TelldusConfig {
            client_key: Some("from-config".to_string()),
            client_secret: Some("secret-from-config".to_string()),
            ..TelldusConfig::default()
        };
        let credentials = config.credentials(&store).unwrap();
        assert_eq!(credentials.client_key, "from-config");
        assert_eq!(credentials.client_secret, "secret-from-config");
        assert_eq!(credentials.resource_owner_key, "resource_owner_key-value");
    }

    #[test]
    fn test_missing_credential() {
        let store = store_with_settings(&["CLIENT_KEY", "CLIENT_SECRET", "RESOURCE_OWNER_SECRET"]);
        let err = TelldusConfig::default().credentials(&store).unwrap_err();
        match &err {
            ConfigError::MissingCredential { field, setting } => {
                assert_eq!(*field, "resource_owner_key");
                assert_eq!(setting, "RESOURCE_OWNER_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("RESOURCE_OWNER_KEY"));
    }

    #[test]
    fn test_settings_read_failure() {
        let store = MemoryStore::new();
        store.fail_reads(true);
        let err = TelldusConfig::default().credentials(&store).unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = TelldusConfig {
            client_secret: Some("hunter2".to_string()),
            ..TelldusConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
