//! Bus events kept for HTTP clients.
//!
//! Toasts and alert snapshots are published while a request (or a
//! background loop) runs, but a browser only sees them when it polls. The
//! feed holds its own bus receiver and drains it on every read, so anything
//! published before a request arrives is visible to that request.

use crate::components::local_store::NotificationAlert;
use crate::events::{AppEvent, EventBus, Toast, ToastAction};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Oldest toasts are dropped past this many
const MAX_PENDING_TOASTS: usize = 50;

/// A toast as served to clients, with its button caption
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastView {
    #[serde(flatten)]
    pub toast: Toast,
    pub action_label: String,
}

struct PendingToast {
    toast: Toast,
    seen_at: Instant,
}

impl PendingToast {
    fn expired(&self, now: Instant) -> bool {
        match self.toast.duration {
            Some(duration) => now.duration_since(self.seen_at) >= duration,
            None => false,
        }
    }
}

struct FeedState {
    events: broadcast::Receiver<AppEvent>,
    toasts: VecDeque<PendingToast>,
    /// Latest scheduler snapshot; `None` until the first check ran
    alerts: Option<Vec<NotificationAlert>>,
}

impl FeedState {
    fn drain(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(AppEvent::Toast(toast)) => {
                    self.toasts.push_back(PendingToast {
                        toast,
                        seen_at: Instant::now(),
                    });
                    if self.toasts.len() > MAX_PENDING_TOASTS {
                        self.toasts.pop_front();
                    }
                }
                Ok(AppEvent::AlertsUpdated(alerts)) => self.alerts = Some(alerts),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => warn!("Client feed skipped {} events", skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        // Timed toasts count from when the feed first saw them
        let now = Instant::now();
        self.toasts.retain(|pending| !pending.expired(now));
    }

    fn take_toast(&mut self, id: &str) -> Option<Toast> {
        let index = self.toasts.iter().position(|p| p.toast.id == id)?;
        self.toasts.remove(index).map(|p| p.toast)
    }
}

#[derive(Clone)]
pub struct ClientFeed {
    bus: EventBus,
    state: Arc<Mutex<FeedState>>,
}

impl ClientFeed {
    /// Subscribe to `bus`. Only events published after this call are kept.
    pub fn new(bus: &EventBus) -> Self {
        Self {
            bus: bus.clone(),
            state: Arc::new(Mutex::new(FeedState {
                events: bus.subscribe(),
                toasts: VecDeque::new(),
                alerts: None,
            })),
        }
    }

    /// Toasts not yet activated, dismissed or timed out, oldest first
    pub async fn toasts(&self) -> Vec<ToastView> {
        let mut state = self.state.lock().await;
        state.drain();
        state
            .toasts
            .iter()
            .map(|pending| ToastView {
                action_label: pending.toast.action.label(),
                toast: pending.toast.clone(),
            })
            .collect()
    }

    /// Press the toast's button: the toast is removed and its action runs on
    /// the bus. `None` when no such toast is pending.
    pub async fn activate(&self, id: &str) -> Option<ToastAction> {
        let toast = {
            let mut state = self.state.lock().await;
            state.drain();
            state.take_toast(id)?
        };
        debug!("Activating toast {}", toast.id);
        self.bus.activate(&toast);
        Some(toast.action)
    }

    pub async fn dismiss(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.drain();
        state.take_toast(id).is_some()
    }

    /// Alerts from the last scheduler check
    pub async fn active_alerts(&self) -> Option<Vec<NotificationAlert>> {
        let mut state = self.state.lock().await;
        state.drain();
        state.alerts.clone()
    }

    /// Drop a dismissed alert from the snapshot until the next check
    pub async fn forget_alert(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.drain();
        if let Some(alerts) = state.alerts.as_mut() {
            alerts.retain(|alert| alert.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ToastSeverity;
    use std::time::Duration;

    fn retry_toast() -> Toast {
        Toast::new(
            ToastSeverity::Error,
            "falhou",
            Some(Duration::from_secs(6)),
            ToastAction::Retry {
                text: "comprar leite".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_toasts_published_before_read_are_listed() {
        rust_i18n::set_locale("pt-BR");
        let bus = EventBus::new();
        let feed = ClientFeed::new(&bus);

        bus.toast(retry_toast());
        let toasts = feed.toasts().await;
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].action_label, "Tentar Novamente");

        let value = serde_json::to_value(&toasts[0]).unwrap();
        assert_eq!(value["message"], "falhou");
        assert_eq!(value["durationMs"], 6000);
        assert_eq!(value["action"]["kind"], "retry");
        assert_eq!(value["actionLabel"], "Tentar Novamente");
    }

    #[tokio::test]
    async fn test_activate_removes_toast_and_publishes() {
        let bus = EventBus::new();
        let feed = ClientFeed::new(&bus);
        let mut rx = bus.subscribe();

        let toast = retry_toast();
        bus.toast(toast.clone());

        assert_eq!(feed.activate(&toast.id).await, Some(toast.action.clone()));
        assert!(feed.toasts().await.is_empty());
        assert_eq!(feed.activate(&toast.id).await, None);

        // The toast itself, then the retry it triggered
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::Toast(_)));
        match rx.recv().await.unwrap() {
            AppEvent::RetryRequested { text } => assert_eq!(text, "comprar leite"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timed_toasts_expire() {
        let bus = EventBus::new();
        let feed = ClientFeed::new(&bus);

        bus.toast(Toast::new(ToastSeverity::Success, "ok", Some(Duration::ZERO), ToastAction::Close));
        bus.toast(Toast::new(ToastSeverity::Warning, "fica", None, ToastAction::Close));

        let toasts = feed.toasts().await;
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].toast.message, "fica");
    }

    #[tokio::test]
    async fn test_alert_snapshot_follows_scheduler() {
        let bus = EventBus::new();
        let feed = ClientFeed::new(&bus);
        assert!(feed.active_alerts().await.is_none());

        bus.publish(AppEvent::AlertsUpdated(Vec::new()));
        assert_eq!(feed.active_alerts().await, Some(Vec::new()));
    }
}
