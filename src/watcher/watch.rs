//! One running watch root: source, deduplicator, queue, dispatcher, batcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tokio::runtime::Handle;

use super::dedup::Deduplicator;
use super::dispatcher::{DispatchStats, DispatchStatsSnapshot, Dispatcher, MessageSink};
use super::queue::ChangeQueue;
use super::source::{EventResult, NotifyBackend, SourceHandle, WatchBackend, WatchSource};
use crate::config::WatchConfig;
use crate::notifications::{HttpTransport, NotificationBatcher, Transport, DEFAULT_TIMEOUT};
use crate::telemetry::metrics;
use crate::Result;

/// A started watch root.
#[derive(Debug)]
pub struct Watch {
    root: PathBuf,
    source: Option<SourceHandle>,
    queue: ChangeQueue,
    batcher: Option<NotificationBatcher>,
    stats: Arc<DispatchStats>,
}

impl Watch {
    /// Start watching the root declared by `config` with the platform watcher.
    ///
    /// Blocks while waiting for the root to appear.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration is invalid, the root never
    /// appears, or the OS refuses the watch.
    pub fn start(config: &WatchConfig, runtime: Handle) -> Result<Self> {
        let (backend, events) = NotifyBackend::new()?;
        Self::start_with(config, runtime, backend, events, None)
    }

    /// Start with an explicit backend and, optionally, notification transport.
    ///
    /// An HTTP transport is created when notifications are declared and no
    /// transport is given.
    ///
    /// # Errors
    ///
    /// Same as [`Watch::start`].
    pub fn start_with<B: WatchBackend>(
        config: &WatchConfig,
        runtime: Handle,
        backend: B,
        events: Receiver<EventResult>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self> {
        config.validate()?;
        let root = config.path.clone();
        let name = root.display().to_string();

        let batcher = match config.notifications() {
            Some(notifications) => {
                let transport = match transport {
                    Some(t) => t,
                    None => Arc::new(HttpTransport::new(DEFAULT_TIMEOUT)?),
                };
                Some(NotificationBatcher::new(
                    name.clone(),
                    notifications,
                    transport,
                    runtime,
                )?)
            }
            None => None,
        };

        let sink = batcher
            .clone()
            .map(|b| Arc::new(b) as Arc<dyn MessageSink>);
        let dispatcher = Dispatcher::from_config(config, sink)?;
        let stats = dispatcher.stats();
        let queue = ChangeQueue::new(name, Arc::new(dispatcher));

        let producer = queue.clone();
        let mut dedup = Deduplicator::new();
        let source = WatchSource::start(
            &root,
            config.source_settings(),
            backend,
            events,
            move |raw| {
                metrics::RAW_EVENTS.inc();
                match dedup.observe(&raw) {
                    Some(change) => producer.enqueue(change),
                    None => {
                        metrics::SUPPRESSED_EVENTS.inc();
                        tracing::trace!(path = %raw.path.display(), trigger = %raw.trigger, "Suppressed duplicate event");
                    }
                }
            },
        )?;

        tracing::info!(
            root = %root.display(),
            destinations = batcher.as_ref().map_or(0, |b| b.destinations().len()),
            actions = config.actions.len(),
            commands = config.commands.len(),
            "Watch started"
        );

        Ok(Self {
            root,
            source: Some(source),
            queue,
            batcher,
            stats,
        })
    }

    /// Root being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if the event source is still delivering.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.source.as_ref().is_some_and(SourceHandle::is_active)
    }

    /// Current dispatch statistics.
    #[must_use]
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the source, finish queued changes, then flush notifications.
    pub async fn shutdown(mut self) -> DispatchStatsSnapshot {
        let source = self.source.take();
        let queue = self.queue.clone();

        let stopped = tokio::task::spawn_blocking(move || {
            if let Some(mut source) = source {
                source.stop();
            }
            queue.close();
        })
        .await;
        if let Err(e) = stopped {
            tracing::error!(root = %self.root.display(), "Failed to drain change queue: {e}");
        }

        if let Some(batcher) = &self.batcher {
            batcher.shutdown().await;
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            root = %self.root.display(),
            received = stats.received,
            filtered = stats.filtered,
            excluded = stats.excluded,
            processed = stats.processed,
            failed = stats.failed,
            "Watch shut down"
        );
        stats
    }
}
