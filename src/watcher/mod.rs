//! File system watching and change dispatch.
//!
//! This module provides:
//! - Per-root OS event sources using notify-rs, with liveness resets and
//!   overflow recovery
//! - Deduplication of raw events into meaningful changes
//! - A per-root queue drained by a single dispatch worker
//! - The dispatch pipeline (filter, exclude, notify, act, run commands)

mod dedup;
mod dispatcher;
mod events;
mod queue;
mod source;
mod watch;

pub use dedup::{Deduplicator, PathProbe};
pub use dispatcher::{DispatchStats, DispatchStatsSnapshot, Dispatcher, MessageSink, Outcome};
pub use events::{Change, RawEvent, Trigger, TriggerSet};
pub use queue::{ChangeProcessor, ChangeQueue};
pub use source::{
    wait_for_path, EventResult, NotifyBackend, SourceHandle, SourceSettings, WatchBackend,
    WatchSource, DEFAULT_PATH_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_RECOVERY_ATTEMPTS,
    DEFAULT_RECOVERY_BACKOFF, DEFAULT_RESET_INTERVAL,
};
pub use watch::Watch;
