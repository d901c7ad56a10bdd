//! Change queue with a single-flight drain worker.
//!
//! Producers (the watch source thread) push changes without blocking. The
//! first push onto an idle queue starts a worker thread that drains the queue
//! in FIFO order and exits when it runs dry; the next push starts a new one.
//! At most one worker drains a queue at any time.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::events::Change;
use crate::telemetry::metrics;

/// Consumer of queued changes.
pub trait ChangeProcessor: Send + Sync {
    /// Apply the full pipeline for one change. Must not panic on routine failures.
    fn process(&self, change: Change);
}

struct QueueInner {
    name: String,
    changes: Mutex<VecDeque<Change>>,
    draining: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    processor: Arc<dyn ChangeProcessor>,
}

/// Unbounded FIFO of changes drained by at most one worker.
#[derive(Clone)]
pub struct ChangeQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for ChangeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeQueue")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("draining", &self.is_draining())
            .finish_non_exhaustive()
    }
}

impl ChangeQueue {
    /// Create a queue feeding `processor`.
    pub fn new(name: impl Into<String>, processor: Arc<dyn ChangeProcessor>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                changes: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                worker: Mutex::new(None),
                processor,
            }),
        }
    }

    /// Push a change and make sure a worker is draining.
    pub fn enqueue(&self, change: Change) {
        self.inner.changes.lock().push_back(change);
        metrics::QUEUE_DEPTH.inc();
        self.start_drain();
    }

    /// Number of changes waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.changes.lock().len()
    }

    /// Check if no changes are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a worker is currently draining.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    fn start_drain(&self) {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name(format!("dispatch-{}", self.inner.name))
            .spawn(move || inner.drain());

        match spawned {
            Ok(handle) => {
                // A previous handle belongs to a worker that already gave up the flag.
                *self.inner.worker.lock() = Some(handle);
            }
            Err(e) => {
                tracing::error!(queue = %self.inner.name, "Failed to spawn dispatch worker, draining inline: {e}");
                self.inner.drain();
            }
        }
    }

    /// Wait until every queued change has been processed.
    ///
    /// Call after the producer has stopped; changes pushed concurrently may
    /// start a new worker that is also waited for.
    pub fn close(&self) {
        loop {
            let handle = self.inner.worker.lock().take();
            match handle {
                Some(handle) => {
                    if handle.join().is_err() {
                        tracing::error!(queue = %self.inner.name, "Dispatch worker panicked");
                    }
                }
                None => break,
            }
        }

        // Only reachable if a spawn failed mid-way.
        if !self.is_empty() && !self.is_draining() {
            self.start_drain();
            self.close();
        }
    }
}

impl QueueInner {
    fn drain(&self) {
        loop {
            let next = self.changes.lock().pop_front();
            if let Some(change) = next {
                metrics::QUEUE_DEPTH.dec();
                let path = change.full_path.clone();
                let processor = &self.processor;
                if catch_unwind(AssertUnwindSafe(|| processor.process(change))).is_err() {
                    tracing::error!(queue = %self.name, path = %path.display(), "Change processing panicked");
                }
                continue;
            }

            self.draining.store(false, Ordering::Release);

            // A push may have landed between the empty pop and releasing the flag.
            if self.changes.lock().is_empty()
                || self
                    .draining
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                return;
            }
        }
    }
}
