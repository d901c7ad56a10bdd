//! filewatcher library
//!
//! Watches folders and reacts to file changes with batched notifications,
//! file actions, and external commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod notifications;
pub mod rules;
pub mod telemetry;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
