use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::Level;

use crate::error::ConfigurationError;
use crate::orchestrator::RunConfig;

/// Settings deserialized from the TOML config file. Everything except the
/// database URL has a default, so a one-line file is a valid config.
#[derive(Deserialize)]
struct Config {
    database_url: String,
    log_level: Option<LogLevel>,
    partitions: Option<u32>,
    chunk_size: Option<u32>,
    page_size: Option<u32>,
    max_workers: Option<u32>,
}

/// Runtime context assembled from the config file.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub(crate) database_url: String,
    pub log_level: LogLevel,
    pub(crate) partitions: u32,
    pub(crate) chunk_size: u32,
    pub(crate) page_size: u32,
    pub(crate) max_workers: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

impl Ctx {
    pub fn load_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_toml)?;

        let ctx = Self {
            database_url: config.database_url,
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            partitions: config.partitions.unwrap_or(1),
            chunk_size: config.chunk_size.unwrap_or(100),
            page_size: config.page_size.unwrap_or(500),
            max_workers: config.max_workers.unwrap_or(4),
        };

        if ctx.partitions == 0 {
            return Err(ConfigurationError::ZeroPartitions.into());
        }
        if ctx.chunk_size == 0 {
            return Err(ConfigurationError::ZeroChunkSize.into());
        }
        if ctx.page_size == 0 {
            return Err(ConfigurationError::ZeroPageSize.into());
        }
        if ctx.max_workers == 0 {
            return Err(ConfigurationError::ZeroWorkers.into());
        }

        Ok(ctx)
    }

    pub async fn get_sqlite_pool(&self) -> Result<SqlitePool, sqlx::Error> {
        configure_sqlite_pool(&self.database_url).await
    }

    /// Run parameters for one invocation; CLI flags override the file.
    pub fn run_config(&self, partitions: Option<u32>, chunk_size: Option<u32>) -> RunConfig {
        RunConfig {
            partition_count: partitions.unwrap_or(self.partitions),
            chunk_size: chunk_size.unwrap_or(self.chunk_size),
            page_size: self.page_size,
            max_workers: self.max_workers,
            expected_events: None,
        }
    }
}

pub(crate) async fn configure_sqlite_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePool::connect(database_url).await?;

    // WAL allows concurrent readers but only one writer at a time across the
    // whole database. Workers in different partitions commit chunks to the
    // same file, so their write transactions serialize here.
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    // Wait up to 10 seconds for a competing chunk commit before failing
    // with "database is locked". Chunk transactions are short, so in
    // practice writers queue well under this bound.
    sqlx::query("PRAGMA busy_timeout = 10000")
        .execute(&pool)
        .await?;

    Ok(pool)
}
