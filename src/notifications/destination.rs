//! Notification destinations and their pending message buffers.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use reqwest::{Method, Url};
use serde::Deserialize;

use super::transport::{Transport, TransportResponse};
use crate::error::NotificationError;
use crate::watcher::{Trigger, TriggerSet};
use crate::Result;

/// Placeholder replaced by the accumulated messages in the request body.
pub const MESSAGE_PLACEHOLDER: &str = "[message]";

fn default_method() -> String {
    "POST".to_string()
}

fn default_body() -> String {
    MESSAGE_PLACEHOLDER.to_string()
}

/// Declared notification destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Request URL.
    pub url: String,
    /// Request method (GET, POST, PUT, PATCH, DELETE).
    #[serde(default = "default_method")]
    pub method: String,
    /// Triggers that queue a message for this destination.
    pub triggers: TriggerSet,
    /// Request body template containing `[message]`.
    #[serde(default = "default_body")]
    pub body: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Result of flushing one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Empty,
    /// Another flush of this destination is in progress.
    Busy,
    /// The batch was sent and the destination answered.
    Sent(TransportResponse),
    /// The send failed; the batch was discarded.
    Failed(String),
}

/// A notification target with its accumulating message buffer.
#[derive(Debug)]
pub struct Destination {
    url: Url,
    method: Method,
    triggers: TriggerSet,
    headers: Vec<(String, String)>,
    body: String,
    pending: Mutex<String>,
    flushing: tokio::sync::Mutex<()>,
}

impl Destination {
    /// Build a destination from its declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or method is invalid.
    pub fn new(config: &DestinationConfig) -> Result<Self> {
        let url = Url::parse(config.url.trim()).map_err(|e| NotificationError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            url,
            method: parse_method(&config.method)?,
            triggers: config.triggers,
            headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: config.body.clone(),
            pending: Mutex::new(String::new()),
            flushing: tokio::sync::Mutex::new(()),
        })
    }

    /// Destination URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Append `message` if this destination subscribes to `trigger`.
    ///
    /// Returns `true` if the message was queued.
    pub fn queue(&self, trigger: Trigger, message: &str) -> bool {
        if !self.triggers.includes(trigger) {
            return false;
        }

        let mut pending = self.pending.lock();
        pending.push_str(&clean_message(message));
        pending.push_str("\\n");
        true
    }

    /// Check whether messages are waiting to be sent.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Copy of the pending buffer.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> String {
        self.pending.lock().clone()
    }

    /// Send the pending batch through `transport`, or return
    /// [`FlushOutcome::Busy`] if another flush is in progress.
    ///
    /// The sent batch is removed from the buffer once the attempt completes,
    /// whether or not it succeeded. Messages queued during the send stay
    /// pending for the next flush.
    pub async fn flush(&self, transport: &dyn Transport) -> FlushOutcome {
        let Ok(_guard) = self.flushing.try_lock() else {
            return FlushOutcome::Busy;
        };
        self.send_pending(transport).await
    }

    /// Wait for any flush in progress to finish, then send what remains.
    pub async fn flush_waiting(&self, transport: &dyn Transport) -> FlushOutcome {
        let _guard = self.flushing.lock().await;
        self.send_pending(transport).await
    }

    /// Callers must hold `flushing`.
    async fn send_pending(&self, transport: &dyn Transport) -> FlushOutcome {
        let batch = self.pending.lock().clone();
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let body = self.body.replace(MESSAGE_PLACEHOLDER, &batch);
        let result = transport
            .send(&self.method, &self.url, &self.headers, body)
            .await;

        // Only flush removes from the buffer, so the batch is still its prefix.
        self.pending.lock().replace_range(..batch.len(), "");

        match result {
            Ok(response) => FlushOutcome::Sent(response),
            Err(e) => FlushOutcome::Failed(e.to_string()),
        }
    }
}

fn parse_method(method: &str) -> std::result::Result<Method, NotificationError> {
    match method.trim().to_ascii_uppercase().as_str() {
        "" | "POST" => Ok(Method::POST),
        "GET" => Ok(Method::GET),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(NotificationError::InvalidMethod(method.to_string())),
    }
}

/// Escape backslashes, trim, and normalise line endings.
fn clean_message(message: &str) -> String {
    message
        .replace('\\', "\\\\")
        .trim()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}
