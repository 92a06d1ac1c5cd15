//! Configuration module
//!
//! Settings are read from the process environment (and an optional `.env` file)
//! once at startup by the composition root.

use std::env;
use std::path::PathBuf;

use crate::models::RemoteLocation;

// Common constants
const DATABASE_URL: &str = "sqlite://videval.db?mode=rwc";
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MEDIA_ROOT: &str = "./media";
const MEDIA_BASE_URL: &str = "http://localhost:8000/media";
const FFMPEG_PATH: &str = "ffmpeg";
const CUT_TIMEOUT_SECS: u64 = 900;
const TASK_QUEUE_MAX_WORKERS: usize = 2;
const TASK_QUEUE_CAPACITY: usize = 1000;
const TASK_QUEUE_POLL_INTERVAL_MS: u64 = 100;
const TASK_QUEUE_MONITOR_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub media_root: PathBuf,
    pub media_base_url: String,
    // Remote tier; absent means files stay local
    pub remote_location: Option<RemoteLocation>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub ffmpeg_path: String,
    pub cut_timeout_secs: u64,
    pub task_queue_max_workers: usize,
    pub task_queue_capacity: usize,
    pub task_queue_poll_interval_ms: u64,
    pub task_queue_monitor_interval_ms: u64,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let remote_location = match env::var("REMOTE_LOCATION") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.parse::<RemoteLocation>()
                    .map_err(|e| anyhow::anyhow!("REMOTE_LOCATION is invalid: {}", e))?,
            ),
            _ => None,
        };

        let config = Config {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            media_root: PathBuf::from(
                env::var("MEDIA_ROOT").unwrap_or_else(|_| MEDIA_ROOT.to_string()),
            ),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| MEDIA_BASE_URL.to_string()),
            remote_location,
            s3_region: env::var("S3_REGION").or_else(|_| env::var("AWS_REGION")).ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| FFMPEG_PATH.to_string()),
            cut_timeout_secs: env::var("CUT_TIMEOUT_SECS")
                .unwrap_or_else(|_| CUT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CUT_TIMEOUT_SECS),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_capacity: env::var("TASK_QUEUE_CAPACITY")
                .unwrap_or_else(|_| TASK_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_CAPACITY),
            task_queue_poll_interval_ms: env::var("TASK_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| TASK_QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_POLL_INTERVAL_MS),
            task_queue_monitor_interval_ms: env::var("TASK_QUEUE_MONITOR_INTERVAL_MS")
                .unwrap_or_else(|_| TASK_QUEUE_MONITOR_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MONITOR_INTERVAL_MS),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid SQLite connection string"
            ));
        }

        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_MAX_WORKERS must be greater than 0"
            ));
        }

        if self.task_queue_capacity == 0 {
            return Err(anyhow::anyhow!("TASK_QUEUE_CAPACITY must be greater than 0"));
        }

        if self.cut_timeout_secs == 0 {
            return Err(anyhow::anyhow!("CUT_TIMEOUT_SECS must be greater than 0"));
        }

        if self.remote_location.is_some() && self.s3_region.is_none() {
            return Err(anyhow::anyhow!(
                "REMOTE_LOCATION requires S3_REGION (or AWS_REGION) to be set"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            database_url: DATABASE_URL.to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            media_root: PathBuf::from(MEDIA_ROOT),
            media_base_url: MEDIA_BASE_URL.to_string(),
            remote_location: None,
            s3_region: None,
            s3_endpoint: None,
            ffmpeg_path: FFMPEG_PATH.to_string(),
            cut_timeout_secs: CUT_TIMEOUT_SECS,
            task_queue_max_workers: TASK_QUEUE_MAX_WORKERS,
            task_queue_capacity: TASK_QUEUE_CAPACITY,
            task_queue_poll_interval_ms: TASK_QUEUE_POLL_INTERVAL_MS,
            task_queue_monitor_interval_ms: TASK_QUEUE_MONITOR_INTERVAL_MS,
            log_json: false,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        let mut config = base();
        config.database_url = "postgresql://localhost/videval".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = base();
        config.task_queue_max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_location_requires_region() {
        let mut config = base();
        config.remote_location = Some("bucket/prefix".parse().unwrap());
        assert!(config.validate().is_err());

        config.s3_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }
}
