//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Raw events received from watch sources.
pub static RAW_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "filewatcher_raw_events_total",
        "Raw events received from the OS"
    )
    .unwrap()
});

/// Raw events dropped by the deduplicator.
pub static SUPPRESSED_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "filewatcher_suppressed_events_total",
        "Raw events suppressed as duplicates"
    )
    .unwrap()
});

/// Changes dispatched, by outcome.
pub static CHANGES_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "filewatcher_changes_total",
        "Changes taken off the queue",
        &["outcome"]
    )
    .unwrap()
});

/// Notification sends, by result.
pub static NOTIFICATION_SENDS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "filewatcher_notification_sends_total",
        "Notification batches sent",
        &["result"]
    )
    .unwrap()
});

/// Changes waiting in all queues.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "filewatcher_queue_depth",
        "Number of changes waiting to be dispatched"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*RAW_EVENTS;
    let _ = &*SUPPRESSED_EVENTS;
    let _ = &*CHANGES_DISPATCHED;
    let _ = &*NOTIFICATION_SENDS;
    let _ = &*QUEUE_DEPTH;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render all registered metrics in the text exposition format.
#[must_use]
pub fn render_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();

        RAW_EVENTS.inc();
        assert!(RAW_EVENTS.get() >= 1);

        CHANGES_DISPATCHED.with_label_values(&["processed"]).inc();
        assert!(CHANGES_DISPATCHED.with_label_values(&["processed"]).get() >= 1);
    }

    #[test]
    fn test_render_contains_names() {
        init_metrics();
        SUPPRESSED_EVENTS.inc();

        let text = render_metrics();
        assert!(text.contains("filewatcher_suppressed_events_total"));
    }
}
