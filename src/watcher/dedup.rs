//! Raw event deduplication.
//!
//! A single logical file operation routinely surfaces as several raw events:
//! a copy shows up as one create followed by a handful of change events for
//! the same path, and copy/move side effects repeat change events with an
//! unchanged write time. The deduplicator keeps a single-slot memory of the
//! last accepted change and drops raw events that repeat it.
//!
//! The heuristic is best-effort. It can drop a genuine second edit that lands
//! within the filesystem's write-time resolution, and it lets through
//! duplicates whose write times differ.

use std::path::Path;
use std::time::SystemTime;

use super::events::{Change, RawEvent, Trigger};

/// What the filesystem currently says about an event's target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathProbe {
    /// Target exists and is a directory.
    pub is_dir: bool,
    /// Last write time, if the target exists.
    pub write_time: Option<SystemTime>,
}

impl PathProbe {
    /// Inspect `path` on disk. Missing paths yield an empty probe.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        std::fs::metadata(path).map_or_else(
            |_| Self::default(),
            |meta| Self {
                is_dir: meta.is_dir(),
                write_time: meta.modified().ok(),
            },
        )
    }
}

/// Per-root deduplicator with single-slot memory.
#[derive(Debug, Default)]
pub struct Deduplicator {
    last_change: Option<Change>,
    last_write_time: Option<SystemTime>,
}

impl Deduplicator {
    /// Create a deduplicator with empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a raw event, probing the filesystem for its target.
    pub fn observe(&mut self, raw: &RawEvent) -> Option<Change> {
        let probe = PathProbe::of(&raw.path);
        self.observe_with(raw, probe)
    }

    /// Observe a raw event with an already-taken filesystem probe.
    ///
    /// Returns `None` when the event repeats the previous accepted change.
    pub fn observe_with(&mut self, raw: &RawEvent, probe: PathProbe) -> Option<Change> {
        if raw.trigger == Trigger::Change {
            // Directory content changes arrive as child events.
            if probe.is_dir {
                return None;
            }

            if let Some(last) = &self.last_change {
                if last.full_path == raw.path {
                    match last.trigger {
                        Trigger::Create => return None,
                        Trigger::Change if self.last_write_time == probe.write_time => {
                            return None;
                        }
                        _ => {}
                    }
                }
            }
        }

        let change = Change::new(raw.trigger, raw.path.clone());
        self.last_change = Some(change.clone());
        self.last_write_time = probe.write_time;
        Some(change)
    }

    /// Last accepted change, if any.
    #[cfg(test)]
    pub(crate) fn last_change(&self) -> Option<&Change> {
        self.last_change.as_ref()
    }
}
