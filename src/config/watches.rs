//! Watch declarations loaded from the TOML watch file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::notifications::NotificationsConfig;
use crate::rules::{ActionConfig, CommandConfig, MatchConfig};
use crate::watcher::SourceSettings;
use crate::{Error, Result};

const fn default_true() -> bool {
    true
}

const fn default_path_timeout_secs() -> u64 {
    60
}

const fn default_reset_interval_secs() -> u64 {
    300
}

const fn default_recovery_attempts() -> u32 {
    120
}

const fn default_recovery_backoff_secs() -> u64 {
    30
}

/// Contents of a watch file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchesFile {
    /// Declared watch roots.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

impl WatchesFile {
    /// Read and validate a watch file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read watch file '{}': {e}", path.display()))
        })?;
        let file: Self = contents.parse()?;
        tracing::debug!(path = %path.display(), roots = file.watch.len(), "Loaded watch file");
        Ok(file)
    }

    /// Check file-level constraints. Each root's own rules are checked when
    /// that root starts, so one malformed root does not reject the others.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is declared or a path is declared twice.
    pub fn validate(&self) -> Result<()> {
        if self.watch.is_empty() {
            return Err(Error::config("no [[watch]] entries declared"));
        }

        for (i, watch) in self.watch.iter().enumerate() {
            if self.watch[..i].iter().any(|w| w.path == watch.path) {
                return Err(Error::config(format!(
                    "watch path '{}' is declared more than once",
                    watch.path.display()
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for WatchesFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let file: Self =
            toml::from_str(s).map_err(|e| Error::config(format!("invalid watch file: {e}")))?;
        file.validate()?;
        Ok(file)
    }
}

/// One watched root and everything that reacts to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Root folder.
    pub path: PathBuf,
    /// Watch subfolders too.
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Seconds to wait for the root to appear.
    #[serde(default = "default_path_timeout_secs")]
    pub path_timeout_secs: u64,
    /// Seconds between liveness resets.
    #[serde(default = "default_reset_interval_secs")]
    pub reset_interval_secs: u64,
    /// Re-enable attempts after an overflow.
    #[serde(default = "default_recovery_attempts")]
    pub recovery_attempts: u32,
    /// Seconds between re-enable attempts.
    #[serde(default = "default_recovery_backoff_secs")]
    pub recovery_backoff_secs: u64,
    /// Only changes matching these reach the pipeline.
    #[serde(default)]
    pub filters: Option<MatchConfig>,
    /// Changes matching these are dropped.
    #[serde(default)]
    pub exclusions: Option<MatchConfig>,
    #[serde(default)]
    pub notifications: Option<NotificationsConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

impl WatchConfig {
    /// Create a declaration for `path` with default tuning and no rules.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: true,
            path_timeout_secs: default_path_timeout_secs(),
            reset_interval_secs: default_reset_interval_secs(),
            recovery_attempts: default_recovery_attempts(),
            recovery_backoff_secs: default_recovery_backoff_secs(),
            filters: None,
            exclusions: None,
            notifications: None,
            actions: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Validate this declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if a value or rule is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::config("watch path cannot be empty"));
        }

        let context = |e: Error| match e {
            Error::Config(msg) => {
                Error::Config(format!("watch '{}': {msg}", self.path.display()))
            }
            other => other,
        };

        if self.reset_interval_secs == 0 {
            return Err(context(Error::config("reset_interval_secs cannot be 0")));
        }

        for action in &self.actions {
            action.validate().map_err(context)?;
        }
        for command in &self.commands {
            command.validate().map_err(context)?;
        }

        Ok(())
    }

    /// Destinations declared for this root, if any.
    #[must_use]
    pub fn notifications(&self) -> Option<&NotificationsConfig> {
        self.notifications
            .as_ref()
            .filter(|n| !n.destinations.is_empty())
    }

    /// Event source tuning for this root.
    #[must_use]
    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            recursive: self.recursive,
            path_timeout: Duration::from_secs(self.path_timeout_secs),
            reset_interval: Duration::from_secs(self.reset_interval_secs),
            recovery_attempts: self.recovery_attempts,
            recovery_backoff: Duration::from_secs(self.recovery_backoff_secs),
            ..SourceSettings::default()
        }
    }
}
