//! Per-change pipeline: filter, exclude, notify, act, run commands.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::events::{Change, Trigger};
use super::queue::ChangeProcessor;
use crate::config::WatchConfig;
use crate::notifications::NotificationBatcher;
use crate::rules::{
    ActionConfig, ActionExecutor, CommandConfig, CommandRunner, FsActionExecutor, MatchRules,
    PathMatcher, ProcessCommandRunner,
};
use crate::telemetry::metrics;
use crate::Result;

/// Statistics for change dispatching.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub received: AtomicU64,
    pub filtered: AtomicU64,
    pub excluded: AtomicU64,
    pub processed: AtomicU64,
    pub failed: AtomicU64,
}

impl DispatchStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub filtered: u64,
    pub excluded: u64,
    pub processed: u64,
    pub failed: u64,
}

/// What happened to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Did not match the filters.
    Filtered,
    /// Matched an exclusion.
    Excluded,
    /// Every step ran.
    Processed,
    /// An action or command failed and later steps were skipped.
    ///
    /// Notifications are queued before actions run, so a failed change has
    /// usually already queued its message.
    Failed,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Self::Filtered => "filtered",
            Self::Excluded => "excluded",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

/// Receiver of notification messages.
pub trait MessageSink: Send + Sync {
    /// Queue `message` for destinations subscribed to `trigger`.
    fn queue(&self, trigger: Trigger, message: &str);
}

impl MessageSink for NotificationBatcher {
    fn queue(&self, trigger: Trigger, message: &str) {
        Self::queue(self, trigger, message);
    }
}

/// Applies one watch root's rules to each change, serially.
pub struct Dispatcher {
    root: PathBuf,
    filters: Option<Box<dyn PathMatcher>>,
    exclusions: Option<Box<dyn PathMatcher>>,
    notifications: Option<Arc<dyn MessageSink>>,
    actions: Vec<ActionConfig>,
    executor: Arc<dyn ActionExecutor>,
    commands: Vec<CommandConfig>,
    runner: Arc<dyn CommandRunner>,
    stats: Arc<DispatchStats>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root)
            .field("actions", &self.actions.len())
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no rules, using the real filesystem and processes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filters: None,
            exclusions: None,
            notifications: None,
            actions: Vec::new(),
            executor: Arc::new(FsActionExecutor),
            commands: Vec::new(),
            runner: Arc::new(ProcessCommandRunner),
            stats: DispatchStats::new(),
        }
    }

    /// Build a dispatcher from a watch declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter or exclusion pattern is invalid.
    pub fn from_config(
        config: &WatchConfig,
        notifications: Option<Arc<dyn MessageSink>>,
    ) -> Result<Self> {
        let mut dispatcher = Self::new(&config.path);

        if let Some(filters) = config.filters.as_ref().filter(|f| f.is_specified()) {
            dispatcher = dispatcher.with_filters(MatchRules::new(filters)?);
        }
        if let Some(exclusions) = config.exclusions.as_ref().filter(|e| e.is_specified()) {
            dispatcher = dispatcher.with_exclusions(MatchRules::new(exclusions)?);
        }

        dispatcher.notifications = notifications;
        dispatcher.actions.clone_from(&config.actions);
        dispatcher.commands.clone_from(&config.commands);
        Ok(dispatcher)
    }

    /// Only dispatch changes matching `filters`.
    #[must_use]
    pub fn with_filters(mut self, filters: impl PathMatcher + 'static) -> Self {
        self.filters = Some(Box::new(filters));
        self
    }

    /// Drop changes matching `exclusions`.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: impl PathMatcher + 'static) -> Self {
        self.exclusions = Some(Box::new(exclusions));
        self
    }

    /// Route messages to `sink`.
    #[must_use]
    pub fn with_notifications(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Add an action rule.
    #[must_use]
    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.push(action);
        self
    }

    /// Add a command rule.
    #[must_use]
    pub fn with_command(mut self, command: CommandConfig) -> Self {
        self.commands.push(command);
        self
    }

    /// Replace the file action executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the command runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Run the pipeline for one change and record the outcome.
    pub fn dispatch(&self, change: &Change) -> Outcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let outcome = self.apply(change);
        let counter = match outcome {
            Outcome::Filtered => &self.stats.filtered,
            Outcome::Excluded => &self.stats.excluded,
            Outcome::Processed => &self.stats.processed,
            Outcome::Failed => &self.stats.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::CHANGES_DISPATCHED
            .with_label_values(&[outcome.label()])
            .inc();

        tracing::debug!(
            root = %self.root.display(),
            path = %change.full_path.display(),
            trigger = %change.trigger,
            outcome = outcome.label(),
            "Dispatched change"
        );
        outcome
    }

    fn apply(&self, change: &Change) -> Outcome {
        let directory = change.directory();

        if let Some(filters) = &self.filters {
            if !filters.matches(directory, &change.name, &change.full_path) {
                return Outcome::Filtered;
            }
        }

        if let Some(exclusions) = &self.exclusions {
            if exclusions.matches(directory, &change.name, &change.full_path) {
                return Outcome::Excluded;
            }
        }

        if let Some(sink) = &self.notifications {
            sink.queue(change.trigger, &change.message());
        }

        // A deleted path has nothing left to copy or move.
        if change.trigger != Trigger::Delete {
            for action in &self.actions {
                if let Err(e) = action.run(self.executor.as_ref(), &self.root, change) {
                    tracing::error!(
                        path = %change.full_path.display(),
                        trigger = %change.trigger,
                        "Could not {:?} file: {e}",
                        action.kind
                    );
                    return Outcome::Failed;
                }
            }
        }

        for command in &self.commands {
            if let Err(e) = command.run(self.runner.as_ref(), &self.root, change) {
                tracing::error!(
                    path = %change.full_path.display(),
                    trigger = %change.trigger,
                    "Command failed: {e}"
                );
                return Outcome::Failed;
            }
        }

        Outcome::Processed
    }
}

impl ChangeProcessor for Dispatcher {
    fn process(&self, change: Change) {
        self.dispatch(&change);
    }
}
