//! Batched HTTP notifications.
//!
//! This module provides:
//! - Per-destination message buffers
//! - A timer-driven batcher that flushes them
//! - The HTTP transport used to send batches

mod batcher;
mod destination;
mod transport;

pub use batcher::{
    BatcherState, NotificationBatcher, NotificationsConfig, DEFAULT_WAIT_TIME, DEFAULT_WAIT_TIME_MS,
    MIN_WAIT_TIME,
};
pub use destination::{Destination, DestinationConfig, FlushOutcome, MESSAGE_PLACEHOLDER};
pub use transport::{HttpTransport, Transport, TransportResponse, DEFAULT_TIMEOUT};
