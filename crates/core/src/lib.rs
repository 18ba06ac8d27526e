pub mod config;
pub mod models;

pub use config::{ConfigError, ServiceConfig, StorageBackendKind};
pub use models::*;
