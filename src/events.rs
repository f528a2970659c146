//! In-process event channel.
//!
//! The response handler, the voice session and the notification scheduler
//! publish here instead of calling back into whoever constructed them.
//! Listeners (the voice and calendar components, the HTTP layer, tests)
//! subscribe independently.

use crate::components::local_store::{NotificationAlert, Task};
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastSeverity {
    Success,
    Info,
    Warning,
    Error,
}

/// Payload handed to whoever collects the information an agent asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedsInfoRequest {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub missing: Vec<String>,
    pub original_input: String,
}

/// Button attached to a toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ToastAction {
    Close,
    /// Replay the voice command with exactly this text
    Retry { text: String },
    CompleteInfo(NeedsInfoRequest),
}

impl ToastAction {
    pub fn label(&self) -> String {
        match self {
            Self::Close => t!("label_close").to_string(),
            Self::Retry { .. } => t!("label_retry").to_string(),
            Self::CompleteInfo(_) => t!("label_complete").to_string(),
        }
    }
}

/// A user-facing notification intent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: String,
    pub severity: ToastSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` keeps the toast until the user dismisses it
    #[serde(rename = "durationMs", serialize_with = "serialize_duration_ms")]
    pub duration: Option<Duration>,
    pub action: ToastAction,
}

impl Toast {
    pub fn new(severity: ToastSeverity, message: impl Into<String>, duration: Option<Duration>, action: ToastAction) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            severity,
            message: message.into(),
            description: None,
            duration,
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_sticky(&self) -> bool {
        self.duration.is_none()
    }
}

fn serialize_duration_ms<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Toast(Toast),
    TaskCreated(Task),
    /// Cached calendar data should be reloaded from Google
    RefreshRequested,
    NeedsInfo(NeedsInfoRequest),
    RetryRequested { text: String },
    AlertsUpdated(Vec<NotificationAlert>),
}

/// Broadcast bus for [`AppEvent`]s. Publishing never blocks; lagging
/// receivers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Returns how many receivers got the event
    pub fn publish(&self, event: AppEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {:?}", event);
                0
            }
        }
    }

    pub fn toast(&self, toast: Toast) -> usize {
        self.publish(AppEvent::Toast(toast))
    }

    /// Perform the action behind a toast's button
    pub fn activate(&self, toast: &Toast) {
        match &toast.action {
            ToastAction::Close => {}
            ToastAction::Retry { text } => {
                self.publish(AppEvent::RetryRequested { text: text.clone() });
            }
            ToastAction::CompleteInfo(request) => {
                self.publish(AppEvent::NeedsInfo(request.clone()));
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
