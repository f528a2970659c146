use super::alerts::check_for_notifications;
use crate::components::local_store::LocalStore;
use crate::events::{AppEvent, EventBus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Start the periodic alert check.
///
/// The first check runs immediately. Checks are skipped while the
/// `notificationsEnabled` setting is off. The loop ends when `cancel` fires.
pub fn start_scheduler(
    store: Arc<LocalStore>,
    bus: EventBus,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Notification scheduler started, checking every {:?}", period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => run_check(&store, &bus).await,
            }
        }

        info!("Notification scheduler stopped");
    })
}

async fn run_check(store: &LocalStore, bus: &EventBus) {
    match store.get_settings().await {
        Ok(settings) if !settings.notifications_enabled() => {
            debug!("Notifications disabled, skipping check");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            error!("Failed to read settings: {}", e);
            return;
        }
    }

    match check_for_notifications(store, Utc::now()).await {
        Ok(alerts) => {
            debug!("{} active alerts", alerts.len());
            bus.publish(AppEvent::AlertsUpdated(alerts));
        }
        Err(e) => error!("Failed to check for notifications: {}", e),
    }
}
