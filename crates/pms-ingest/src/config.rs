//! Configuration management

use pms_common::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/pms";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default directory for uploaded bundles and per-run scratch space.
pub const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";

/// Default root of archival evidence storage.
pub const DEFAULT_ARCHIVE_DIR: &str = "./data/archive";

/// Default upload size ceiling (500 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Ingestion filesystem layout and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Uploaded bundles land here; scratch directories are created beneath it
    pub upload_dir: PathBuf,
    /// Root of `<asset>/<YYMMDD>_<filename>` archival storage
    pub archive_dir: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_size: u64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from an arbitrary variable source. Unparseable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
        where
            F: Fn(&str) -> Option<String>,
            T: std::str::FromStr,
        {
            lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
        }

        Config {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                max_connections: parsed(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: parsed(
                    &lookup,
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: parsed(
                    &lookup,
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            ingest: IngestConfig {
                upload_dir: lookup("PMS_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
                archive_dir: lookup("PMS_ARCHIVE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
                max_upload_size: parsed(&lookup, "PMS_MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.database.validate()?;
        self.ingest.validate()
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.min_connections > self.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections,
                self.max_connections
            );
        }

        Ok(())
    }

    /// Open a connection pool
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await
    }
}

impl IngestConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload_dir.as_os_str().is_empty() {
            anyhow::bail!("Upload directory cannot be empty");
        }

        if self.archive_dir.as_os_str().is_empty() {
            anyhow::bail!("Archive directory cannot be empty");
        }

        if self.max_upload_size == 0 {
            anyhow::bail!("Maximum upload size must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// Logging settings for the CLI
///
/// `.env` is loaded first so its `LOG_*` values apply to logging as well as
/// to [`Config::load`]. Variables already in the environment win.
pub fn log_config(verbose: bool) -> anyhow::Result<LogConfig> {
    dotenvy::dotenv().ok();
    log_config_from(verbose, |key| std::env::var(key).ok())
}

/// CLI logging defaults overlaid with `LOG_*` values from `lookup`
pub fn log_config_from<F>(verbose: bool, lookup: F) -> anyhow::Result<LogConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    LogConfig::builder()
        .level(level)
        .log_file_prefix("pms-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_lookup(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_log_config_honors_dotenv_values() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "LOG_LEVEL=warn\nLOG_FORMAT=json\n").unwrap();
        let vars: HashMap<String, String> = dotenvy::from_path_iter(&env_file)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let config = log_config_from(true, |key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, pms_common::logging::LogFormat::Json);
        assert_eq!(config.log_file_prefix, "pms-ingest");
        assert_eq!(config.filter_directives.as_deref(), Some("sqlx=warn"));
    }

    #[test]
    fn test_log_config_verbose_without_overrides() {
        let config = log_config_from(true, |_| None).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(log_config_from(false, |_| None).unwrap().level, LogLevel::Info);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.ingest.upload_dir, PathBuf::from("./data/uploads"));
        assert_eq!(config.ingest.archive_dir, PathBuf::from("./data/archive"));
        assert_eq!(config.ingest.max_upload_size, 524_288_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://db/pms"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("PMS_ARCHIVE_DIR", "/srv/pms/archive"),
            ("PMS_MAX_UPLOAD_SIZE", "1024"),
        ]));

        assert_eq!(config.database.url, "postgresql://db/pms");
        assert_eq!(config.database.max_connections, DEFAULT_DATABASE_MAX_CONNECTIONS);
        assert_eq!(config.ingest.archive_dir, PathBuf::from("/srv/pms/archive"));
        assert_eq!(config.ingest.max_upload_size, 1024);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.database.min_connections = 10;
        config.database.max_connections = 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ingest.max_upload_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.url.clear();
        assert!(config.validate().is_err());
    }
}
