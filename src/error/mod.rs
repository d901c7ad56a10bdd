//! Error types and Result aliases for filewatcher.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for filewatcher operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Action or command error.
    #[error("action error: {0}")]
    Action(#[from] ActionError),

    /// Notification error.
    #[error("notification error: {0}")]
    Notification(#[from] NotificationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watch root never appeared within the allowed time.
    #[error("path '{}' was not found after waiting {waited_secs}s", path.display())]
    PathNotFound { path: PathBuf, waited_secs: u64 },

    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Recovery from an event source failure gave up.
    #[error("could not re-enable watch on '{path}' after {attempts} attempts")]
    RecoveryExhausted { path: String, attempts: u32 },
}

/// Errors raised by actions and commands for a single change.
#[derive(Error, Debug)]
pub enum ActionError {
    /// Copy failed.
    #[error("could not copy '{}' to '{}': {reason}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Move failed.
    #[error("could not move '{}' to '{}': {reason}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Delete failed.
    #[error("could not delete '{}': {reason}", path.display())]
    Delete { path: PathBuf, reason: String },

    /// Verification after copy found different content.
    #[error("verification failed: '{}' does not match '{}'", from.display(), to.display())]
    Verify { from: PathBuf, to: PathBuf },

    /// External command could not be started.
    #[error("could not run command '{command}': {reason}")]
    Command { command: String, reason: String },
}

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Destination URL is missing or malformed.
    #[error("invalid notification url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Unsupported request method.
    #[error("invalid request method '{0}'")]
    InvalidMethod(String),

    /// Transport failure (connect, timeout, body read).
    #[error("request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl WatcherError {
    /// Create a watch failure for `path`.
    pub fn watch_failed(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
