use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 20_000;
pub const DEFAULT_MAX_REQUESTS_PER_IP: usize = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60 * 60;
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    NotPositive { name: &'static str, value: String },
    #[error("unknown storage backend {0:?} (expected local, s3 or memory)")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Local,
    S3,
    Memory,
}

impl StorageBackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Some(Self::Local),
            "s3" | "aws" => Some(Self::S3),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub chunk_size: usize,
    pub max_requests_per_ip: usize,
    pub rate_limit_window: Duration,
    pub output_bucket: String,
    pub storage_backend: StorageBackendKind,
    pub storage_root: PathBuf,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    pub database_url: Option<String>,
    pub bind: String,
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_requests_per_ip: DEFAULT_MAX_REQUESTS_PER_IP,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            output_bucket: "my-pdf-output-bucket".to_string(),
            storage_backend: StorageBackendKind::Local,
            storage_root: PathBuf::from("data"),
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            database_url: None,
            bind: "0.0.0.0:8080".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source; unset names fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let storage_backend = match non_empty("PDFCHUNK_STORAGE_BACKEND") {
            Some(value) => {
                StorageBackendKind::parse(&value).ok_or(ConfigError::UnknownBackend(value))?
            }
            None => defaults.storage_backend,
        };

        Ok(Self {
            chunk_size: positive(
                "PDFCHUNK_CHUNK_SIZE",
                non_empty("PDFCHUNK_CHUNK_SIZE"),
                defaults.chunk_size,
            )?,
            max_requests_per_ip: positive(
                "PDFCHUNK_MAX_REQUESTS_PER_IP",
                non_empty("PDFCHUNK_MAX_REQUESTS_PER_IP"),
                defaults.max_requests_per_ip,
            )?,
            rate_limit_window: Duration::from_secs(positive(
                "PDFCHUNK_RATE_LIMIT_WINDOW_SECONDS",
                non_empty("PDFCHUNK_RATE_LIMIT_WINDOW_SECONDS"),
                DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            )?),
            output_bucket: non_empty("PDFCHUNK_OUTPUT_BUCKET").unwrap_or(defaults.output_bucket),
            storage_backend,
            storage_root: non_empty("PDFCHUNK_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            aws_region: non_empty("PDFCHUNK_AWS_REGION").unwrap_or(defaults.aws_region),
            s3_endpoint: non_empty("PDFCHUNK_S3_ENDPOINT"),
            database_url: non_empty("PDFCHUNK_DATABASE_URL"),
            bind: non_empty("PDFCHUNK_BIND").unwrap_or(defaults.bind),
            max_body_bytes: positive(
                "PDFCHUNK_MAX_BODY_BYTES",
                non_empty("PDFCHUNK_MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            )?,
        })
    }

    /// Human wording for the rate-limit window, used in 429 messages.
    pub fn rate_limit_window_label(&self) -> String {
        describe_window(self.rate_limit_window)
    }
}

pub fn describe_window(window: Duration) -> String {
    match window.as_secs() {
        3600 => "hour".to_string(),
        60 => "minute".to_string(),
        86_400 => "day".to_string(),
        secs if secs % 3600 == 0 => format!("{} hours", secs / 3600),
        secs if secs % 60 == 0 => format!("{} minutes", secs / 60),
        secs => format!("{secs} seconds"),
    }
}

fn positive<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::NotPositive { name, value: raw }),
    }
}
