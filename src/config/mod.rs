//! Configuration management for filewatcher.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - The TOML watch file, which declares the watched roots

mod settings;
mod watches;

pub use settings::{Config, DEFAULT_CONFIG_PATH};
pub use watches::{WatchConfig, WatchesFile};
