pub mod alerts;
mod scheduler;

pub use alerts::{check_for_notifications, time_remaining};
pub use scheduler::start_scheduler;

use super::AppContext;
use crate::error::AppResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Raises "due soon" alerts for tasks on a fixed period
#[derive(Default)]
pub struct Notifications {
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl super::Component for Notifications {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn init(&self, ctx: &AppContext) -> AppResult<()> {
        let period = Duration::from_secs(ctx.config.read().await.notification_check_interval.max(1));

        let mut running = self.running.lock().await;
        if running.is_none() {
            // Stops with either this component or the whole process
            let cancel = ctx.shutdown.child_token();
            let task = start_scheduler(ctx.store.clone(), ctx.bus.clone(), period, cancel.clone());
            *running = Some((cancel, task));
        }
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        if let Some((cancel, task)) = self.running.lock().await.take() {
            cancel.cancel();
            let _ = task.await;
        }
        info!("Notification scheduler shut down");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
