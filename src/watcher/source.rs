//! OS event source for one watch root.
//!
//! A dedicated thread owns the platform watcher and forwards translated raw
//! events to a sink. The same thread runs the periodic liveness reset and
//! recovers from overflow conditions, so a stuck or dead OS watch only ever
//! affects its own root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use super::events::RawEvent;
use crate::error::WatcherError;

/// Result type carried on the backend's event channel.
pub type EventResult = notify::Result<notify::Event>;

/// Default time to wait for a missing root to appear.
pub const DEFAULT_PATH_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between existence checks while waiting for a root.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between liveness resets.
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(300);

/// Re-enable attempts made after an overflow before giving up.
pub const DEFAULT_RECOVERY_ATTEMPTS: u32 = 120;

/// Sleep between recovery attempts.
pub const DEFAULT_RECOVERY_BACKOFF: Duration = Duration::from_secs(30);

/// Event source tuning.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Watch subdirectories too.
    pub recursive: bool,
    /// How long to wait for the root to exist.
    pub path_timeout: Duration,
    /// How often to check for the root while waiting.
    pub poll_interval: Duration,
    /// Interval of the disable/enable liveness cycle.
    pub reset_interval: Duration,
    /// Re-enable attempts after an overflow.
    pub recovery_attempts: u32,
    /// Sleep between re-enable attempts.
    pub recovery_backoff: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            recursive: true,
            path_timeout: DEFAULT_PATH_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reset_interval: DEFAULT_RESET_INTERVAL,
            recovery_attempts: DEFAULT_RECOVERY_ATTEMPTS,
            recovery_backoff: DEFAULT_RECOVERY_BACKOFF,
        }
    }
}

/// Block until `path` exists, polling every `poll` up to `timeout`.
///
/// # Errors
///
/// Returns `PathNotFound` if the path is still absent when the timeout ends.
pub fn wait_for_path(path: &Path, timeout: Duration, poll: Duration) -> Result<(), WatcherError> {
    let started = Instant::now();
    let mut logged = false;

    while !path.exists() {
        if started.elapsed() >= timeout {
            return Err(WatcherError::PathNotFound {
                path: path.to_path_buf(),
                waited_secs: timeout.as_secs(),
            });
        }
        if !logged {
            tracing::info!(path = %path.display(), timeout_secs = timeout.as_secs(), "Waiting for watch path to appear");
            logged = true;
        }
        std::thread::sleep(poll.min(timeout.saturating_sub(started.elapsed())));
    }

    Ok(())
}

/// Platform primitive that raises events for a root.
pub trait WatchBackend: Send + 'static {
    /// Start raising events for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses the watch.
    fn enable(&mut self, root: &Path, recursive: bool) -> Result<(), WatcherError>;

    /// Stop raising events for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch could not be removed.
    fn disable(&mut self, root: &Path) -> Result<(), WatcherError>;
}

/// Backend using the platform's recommended notify watcher.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Create the watcher and the channel it delivers events on.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> Result<(Self, Receiver<EventResult>), WatcherError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let watcher = notify::recommended_watcher(move |res: EventResult| {
            // The receiver only goes away when the source thread has exited.
            let _ = tx.send(res);
        })
        .map_err(|e| WatcherError::watch_failed("init", e))?;

        Ok((Self { watcher }, rx))
    }
}

impl WatchBackend for NotifyBackend {
    fn enable(&mut self, root: &Path, recursive: bool) -> Result<(), WatcherError> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher
            .watch(root, mode)
            .map_err(|e| WatcherError::watch_failed(root, e))
    }

    fn disable(&mut self, root: &Path) -> Result<(), WatcherError> {
        self.watcher
            .unwatch(root)
            .map_err(|e| WatcherError::watch_failed(root, e))
    }
}

/// Handle to a running event source.
#[derive(Debug)]
pub struct SourceHandle {
    root: PathBuf,
    stop_tx: Sender<()>,
    active: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SourceHandle {
    /// Root this source watches.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if events are still being delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the source and wait for its thread to exit.
    ///
    /// No events reach the sink after this returns.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.stop_tx.send(());
        if thread.join().is_err() {
            tracing::error!(root = %self.root.display(), "Watch source thread panicked");
        }
        self.active.store(false, Ordering::Release);
        tracing::info!(root = %self.root.display(), "Watch stopped");
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts event sources.
#[derive(Debug)]
pub struct WatchSource;

impl WatchSource {
    /// Wait for `root`, enable `backend` on it, and forward its events to `sink`.
    ///
    /// `events` must be the channel `backend` delivers on.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the root never appears, or `WatchFailed` if
    /// the initial enable or thread spawn fails.
    pub fn start<B, F>(
        root: impl Into<PathBuf>,
        settings: SourceSettings,
        mut backend: B,
        events: Receiver<EventResult>,
        sink: F,
    ) -> Result<SourceHandle, WatcherError>
    where
        B: WatchBackend,
        F: FnMut(RawEvent) + Send + 'static,
    {
        let root = root.into();
        wait_for_path(&root, settings.path_timeout, settings.poll_interval)?;
        backend.enable(&root, settings.recursive)?;

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let active = Arc::new(AtomicBool::new(true));

        let worker = SourceLoop {
            root: root.clone(),
            settings,
            backend,
            events,
            stop_rx,
            active: Arc::clone(&active),
            sink,
        };

        let thread = std::thread::Builder::new()
            .name(format!("watch-{}", root.display()))
            .spawn(move || worker.run())
            .map_err(|e| WatcherError::watch_failed(&root, e))?;

        tracing::info!(root = %root.display(), "Watching directory");

        Ok(SourceHandle {
            root,
            stop_tx,
            active,
            thread: Some(thread),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Restored,
    Stopped,
    Exhausted,
}

struct SourceLoop<B, F> {
    root: PathBuf,
    settings: SourceSettings,
    backend: B,
    events: Receiver<EventResult>,
    stop_rx: Receiver<()>,
    active: Arc<AtomicBool>,
    sink: F,
}

impl<B, F> SourceLoop<B, F>
where
    B: WatchBackend,
    F: FnMut(RawEvent),
{
    fn run(mut self) {
        let span = crate::telemetry::spans::watch_span(&self.root.display().to_string());
        let _guard = span.enter();

        let ticker = crossbeam_channel::tick(self.settings.reset_interval);
        let stop_rx = self.stop_rx.clone();
        let events = self.events.clone();

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => {
                        if event.need_rescan() {
                            tracing::warn!("Event buffer overflowed, recovering watch");
                            if !self.recover() {
                                break;
                            }
                            continue;
                        }
                        for raw in RawEvent::from_notify(&event) {
                            (self.sink)(raw);
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Watch error, recovering watch: {e}");
                        if !self.recover() {
                            break;
                        }
                    }
                    Err(_) => {
                        tracing::error!("Event channel closed, watch is down");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    if !self.reset() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.backend.disable(&self.root) {
            tracing::debug!("Disable on exit failed: {e}");
        }
        self.active.store(false, Ordering::Release);
    }

    /// Liveness reset. Falls back to recovery if re-enabling fails.
    fn reset(&mut self) -> bool {
        tracing::debug!("Liveness reset");
        if let Err(e) = self.backend.disable(&self.root) {
            tracing::debug!("Disable during reset failed: {e}");
        }
        match self.backend.enable(&self.root, self.settings.recursive) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Re-enable during reset failed, recovering watch: {e}");
                self.recover()
            }
        }
    }

    /// Returns `false` when the loop should exit.
    fn recover(&mut self) -> bool {
        match self.try_recover() {
            Recovery::Restored => true,
            Recovery::Stopped => false,
            Recovery::Exhausted => {
                let err = WatcherError::RecoveryExhausted {
                    path: self.root.display().to_string(),
                    attempts: self.settings.recovery_attempts,
                };
                tracing::error!(fatal = true, "{err}");
                false
            }
        }
    }

    fn try_recover(&mut self) -> Recovery {
        if let Err(e) = self.backend.disable(&self.root) {
            tracing::debug!("Disable during recovery failed: {e}");
        }

        for attempt in 1..=self.settings.recovery_attempts {
            match self.backend.enable(&self.root, self.settings.recursive) {
                Ok(()) => {
                    tracing::info!(attempt, "Watch re-enabled");
                    return Recovery::Restored;
                }
                Err(e) => {
                    tracing::warn!(attempt, max = self.settings.recovery_attempts, "Re-enable failed: {e}");
                }
            }

            match self.stop_rx.recv_timeout(self.settings.recovery_backoff) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return Recovery::Stopped,
            }
        }

        Recovery::Exhausted
    }
}
