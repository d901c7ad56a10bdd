//! Timer-driven notification batching.
//!
//! Messages accumulate in each destination's buffer and are sent together on
//! a fixed interval. The timer only runs while there is something to send:
//!
//! ```text
//! Idle --first message--> Armed --tick--> Flushing --done--> Armed
//!   ^                       |
//!   +---tick, nothing pending
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::destination::{Destination, DestinationConfig, FlushOutcome};
use super::transport::Transport;
use crate::telemetry::metrics;
use crate::watcher::Trigger;
use crate::Result;

/// Default milliseconds between flushes.
pub const DEFAULT_WAIT_TIME_MS: u64 = 60_000;

/// Default wait time between flushes.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_millis(DEFAULT_WAIT_TIME_MS);

/// Minimum wait time between flushes.
pub const MIN_WAIT_TIME: Duration = Duration::from_millis(30_000);

const fn default_wait_time_ms() -> u64 {
    DEFAULT_WAIT_TIME_MS
}

/// Declared notifications for one watch root.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Milliseconds between flushes.
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    /// Destinations.
    #[serde(default, rename = "destination")]
    pub destinations: Vec<DestinationConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            wait_time_ms: default_wait_time_ms(),
            destinations: Vec::new(),
        }
    }
}

/// Batcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// No timer running.
    Idle,
    /// Timer running.
    Armed,
    /// A tick is sending batches.
    Flushing,
}

struct Inner {
    root: String,
    destinations: Vec<Destination>,
    transport: Arc<dyn Transport>,
    wait_time: Mutex<Duration>,
    state: Mutex<BatcherState>,
    runtime: Handle,
    cancel: CancellationToken,
}

/// Accumulates notification messages and flushes them on a timer.
#[derive(Clone)]
pub struct NotificationBatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NotificationBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBatcher")
            .field("root", &self.inner.root)
            .field("destinations", &self.inner.destinations.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl NotificationBatcher {
    /// Create a batcher for `root`'s declared notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if a destination is invalid.
    pub fn new(
        root: impl Into<String>,
        config: &NotificationsConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Result<Self> {
        let destinations = config
            .destinations
            .iter()
            .map(Destination::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            inner: Arc::new(Inner {
                root: root.into(),
                destinations,
                transport,
                wait_time: Mutex::new(Duration::from_millis(config.wait_time_ms)),
                state: Mutex::new(BatcherState::Idle),
                runtime,
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Change the wait time. Applied from the next tick.
    #[cfg(test)]
    pub(crate) fn set_wait_time(&self, wait_time: Duration) {
        *self.inner.wait_time.lock() = wait_time;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BatcherState {
        *self.inner.state.lock()
    }

    /// Destinations in declaration order.
    #[must_use]
    pub fn destinations(&self) -> &[Destination] {
        &self.inner.destinations
    }

    /// Queue `message` on every destination subscribed to `trigger`.
    ///
    /// Never blocks on I/O. Arms the timer if it was idle.
    pub fn queue(&self, trigger: Trigger, message: &str) {
        let mut queued = false;
        for destination in &self.inner.destinations {
            queued |= destination.queue(trigger, message);
        }

        if queued {
            self.arm();
        }
    }

    fn arm(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }

        let mut state = self.inner.state.lock();
        if *state == BatcherState::Idle {
            *state = BatcherState::Armed;
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(run_timer(inner));
            tracing::debug!(root = %self.inner.root, "Notification timer armed");
        }
    }

    /// Send everything pending right now.
    pub async fn flush(&self) {
        self.inner.flush_all(false).await;
    }

    /// Stop the timer and send whatever is still pending, waiting for any
    /// send already in progress to finish first.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.flush_all(true).await;
        *self.inner.state.lock() = BatcherState::Idle;
    }
}

async fn run_timer(inner: Arc<Inner>) {
    loop {
        let wait = inner.effective_wait_time();
        tokio::select! {
            () = inner.cancel.cancelled() => return,
            () = tokio::time::sleep(wait) => {}
        }

        if !inner.tick().await {
            tracing::debug!(root = %inner.root, "Notification timer idle");
            return;
        }
    }
}

impl Inner {
    /// Wait time, raised to the minimum if configured too low.
    fn effective_wait_time(&self) -> Duration {
        let mut wait = self.wait_time.lock();
        if *wait < MIN_WAIT_TIME {
            tracing::warn!(
                root = %self.root,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                min_ms = u64::try_from(MIN_WAIT_TIME.as_millis()).unwrap_or(u64::MAX),
                "Notification wait time is below the minimum, using the minimum"
            );
            *wait = MIN_WAIT_TIME;
        }
        *wait
    }

    /// One timer tick. Returns `false` when the timer should go idle.
    async fn tick(&self) -> bool {
        {
            let mut state = self.state.lock();
            if !self.destinations.iter().any(Destination::has_pending) {
                *state = BatcherState::Idle;
                return false;
            }
            *state = BatcherState::Flushing;
        }

        self.flush_all(false).await;

        let mut state = self.state.lock();
        if *state == BatcherState::Flushing && !self.cancel.is_cancelled() {
            *state = BatcherState::Armed;
        }
        true
    }

    /// Flush every destination. With `wait`, a destination already being
    /// flushed is waited for and then flushed again instead of skipped.
    async fn flush_all(&self, wait: bool) {
        for destination in &self.destinations {
            let span = crate::telemetry::spans::flush_span(destination.url().as_str());
            let transport = self.transport.as_ref();
            let outcome = if wait {
                destination.flush_waiting(transport).instrument(span).await
            } else {
                destination.flush(transport).instrument(span).await
            };

            match outcome {
                FlushOutcome::Empty | FlushOutcome::Busy => {}
                FlushOutcome::Sent(response) => {
                    metrics::NOTIFICATION_SENDS.with_label_values(&["sent"]).inc();
                    if (200..300).contains(&response.status) {
                        tracing::info!(
                            destination = %destination.url(),
                            status = response.status,
                            "Notification sent"
                        );
                    } else {
                        tracing::warn!(
                            destination = %destination.url(),
                            status = response.status,
                            response = %response.body,
                            "Notification rejected by destination"
                        );
                    }
                }
                FlushOutcome::Failed(reason) => {
                    metrics::NOTIFICATION_SENDS.with_label_values(&["failed"]).inc();
                    tracing::error!(
                        destination = %destination.url(),
                        %reason,
                        "Notification failed, batch discarded"
                    );
                }
            }
        }
    }
}
