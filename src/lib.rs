//! Catalog-Sentinel: a watcher for alphabetically indexed catalogs
//!
//! This crate crawls a listing source one index key (letter) at a time,
//! reconciles every discovered entry against a persistent store and notifies
//! subscribers the moment a genuinely new entry appears.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod notify;
pub mod output;
pub mod render;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Sentinel operations
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Catalog-Sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{CatalogEntry, CycleStats, DedupResult};
pub use config::Config;
pub use crawler::{Coordinator, Scheduler};
