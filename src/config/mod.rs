//! Configuration module for Catalog-Sentinel
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sentinel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sentinel.toml")).unwrap();
//! println!("Walking {} index keys", config.crawler.index_keys.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_index_keys, Config, CrawlerConfig, DedupMode, NotifyConfig, OutputConfig,
    SourceConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
