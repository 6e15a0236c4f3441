//! Configuration for the Echo reply consumer

use std::env;

use hermes::ConfigError;
use hermes::config::DEFAULT_REPLY_STREAM;

/// Echo configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (development, staging, production)
    pub environment: String,

    /// PostgreSQL connection URL
    pub database_url: String,

    /// Database pool size
    pub database_max_connections: u32,

    /// Redis connection URL
    pub redis_url: String,

    /// Stream executors publish replies to
    pub reply_stream: String,

    /// Consumer group shared by all Echo instances
    pub consumer_group: String,

    /// Consumer name prefix; each worker appends its index
    pub worker_id: String,

    /// Number of consumer tasks
    pub workers: usize,

    /// Messages fetched per XREADGROUP
    pub batch_size: usize,

    /// Block timeout for XREADGROUP (milliseconds)
    pub block_timeout_ms: usize,

    /// Pending messages idle for longer than this are claimed (milliseconds)
    pub claim_idle_ms: u64,

    /// Prometheus metrics port
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            reply_stream: lookup("REPLY_STREAM").unwrap_or_else(|| DEFAULT_REPLY_STREAM.to_string()),
            consumer_group: lookup("CONSUMER_GROUP").unwrap_or_else(|| "echo_group".to_string()),
            worker_id: lookup("WORKER_ID").unwrap_or_else(random_worker_id),
            workers: positive(parse_or(&lookup, "WORKERS", 2)?, "WORKERS")?,
            batch_size: positive(parse_or(&lookup, "BATCH_SIZE", 10)?, "BATCH_SIZE")?,
            block_timeout_ms: parse_or(&lookup, "BLOCK_TIMEOUT_MS", 5000)?,
            claim_idle_ms: parse_or(&lookup, "CLAIM_IDLE_MS", 60_000)?,
            metrics_port: parse_or(&lookup, "METRICS_PORT", 9092)?,
        })
    }

    /// Consumer name of the worker with the given index
    pub fn consumer_name(&self, index: usize) -> String {
        format!("{}_{}", self.worker_id, index)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn positive(value: usize, key: &str) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn random_worker_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("echo_{}", &id[..8])
}
