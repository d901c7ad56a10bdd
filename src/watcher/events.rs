//! File system event types and handling.

#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use chrono::{DateTime, Local};
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use serde::Deserialize;

/// Kind of change reported for a file or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Item was created.
    Create,
    /// Item content or metadata changed.
    Change,
    /// Item was deleted.
    Delete,
    /// Item was renamed.
    Rename,
}

impl Trigger {
    /// Label used in notification messages.
    #[must_use]
    pub fn message_label(self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Change => "Changed",
            Self::Delete => "Deleted",
            Self::Rename => "Renamed",
        }
    }

    /// Single-member trigger set.
    #[must_use]
    pub fn as_set(self) -> TriggerSet {
        match self {
            Self::Create => TriggerSet::CREATE,
            Self::Change => TriggerSet::CHANGE,
            Self::Delete => TriggerSet::DELETE,
            Self::Rename => TriggerSet::RENAME,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_label())
    }
}

bitflags! {
    /// Set of triggers a rule subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TriggerSet: u8 {
        const CREATE = 0b0001;
        const CHANGE = 0b0010;
        const DELETE = 0b0100;
        const RENAME = 0b1000;
    }
}

impl TriggerSet {
    /// Check whether `trigger` is part of the set.
    #[must_use]
    pub fn includes(self, trigger: Trigger) -> bool {
        self.contains(trigger.as_set())
    }
}

impl From<Vec<Trigger>> for TriggerSet {
    fn from(triggers: Vec<Trigger>) -> Self {
        triggers
            .into_iter()
            .fold(Self::empty(), |set, t| set | t.as_set())
    }
}

impl<'de> Deserialize<'de> for TriggerSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Vec::<Trigger>::deserialize(deserializer).map(Self::from)
    }
}

/// Low-level event as delivered by the OS watch primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Kind of change.
    pub trigger: Trigger,
    /// Path of the affected item (new path for renames).
    pub path: PathBuf,
}

impl RawEvent {
    /// Create a raw event.
    pub fn new(trigger: Trigger, path: impl Into<PathBuf>) -> Self {
        Self {
            trigger,
            path: path.into(),
        }
    }

    /// Translate a notify event into zero or more raw events.
    ///
    /// Rename pairs are reported through their `To` half only, so a rename
    /// yields a single event carrying the new name.
    #[must_use]
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let trigger = match event.kind {
            EventKind::Create(_) => Trigger::Create,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
                Trigger::Rename
            }
            EventKind::Modify(ModifyKind::Name(_)) => return Vec::new(),
            EventKind::Modify(_) => Trigger::Change,
            EventKind::Remove(_) => Trigger::Delete,
            EventKind::Access(_) | EventKind::Other | EventKind::Any => return Vec::new(),
        };

        event
            .paths
            .iter()
            .map(|p| Self::new(trigger, p.clone()))
            .collect()
    }
}

/// A deduplicated, semantically meaningful change ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Kind of change.
    pub trigger: Trigger,
    /// File or folder name.
    pub name: String,
    /// Full path of the changed item.
    pub full_path: PathBuf,
    /// When the change was accepted.
    pub observed_at: DateTime<Local>,
}

impl Change {
    /// Create a change observed now.
    pub fn new(trigger: Trigger, full_path: impl Into<PathBuf>) -> Self {
        let full_path = full_path.into();
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            trigger,
            name,
            full_path,
            observed_at: Local::now(),
        }
    }

    /// Directory containing the changed item.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.full_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Human-readable notification line, e.g. `Created: /data/a.txt`.
    #[must_use]
    pub fn message(&self) -> String {
        format!("{}: {}", self.trigger.message_label(), self.full_path.display())
    }
}
