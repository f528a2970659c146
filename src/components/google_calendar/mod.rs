mod actor;
pub mod client;
mod handle;
pub mod models;
pub mod token;

pub use client::{GoogleCalendarClient, GoogleEndpoints};
pub use handle::{CreatedEvent, GoogleCalendarHandle};
pub use models::{CalendarEvent, GoogleCredentials, NewCalendarEvent};

use super::AppContext;
use crate::error::AppResult;
use crate::events::AppEvent;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// How far ahead a refresh pulls events into the cache
const REFRESH_WINDOW_DAYS: i64 = 30;

/// Google Calendar component: owns the actor and keeps the event cache
/// fresh when a voice command reports a new event
#[derive(Default)]
pub struct GoogleCalendar {
    handle: RwLock<Option<GoogleCalendarHandle>>,
    endpoints: GoogleEndpoints,
}

impl GoogleCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at other endpoints (tests)
    pub fn with_endpoints(endpoints: GoogleEndpoints) -> Self {
        Self {
            handle: RwLock::new(None),
            endpoints,
        }
    }

    /// Get the handle if it exists
    pub async fn get_handle(&self) -> Option<GoogleCalendarHandle> {
        self.handle.read().await.clone()
    }
}

/// Pull the next 30 days into the cache every time a refresh is requested
fn spawn_refresh_listener(ctx: &AppContext, handle: GoogleCalendarHandle) {
    let mut events = ctx.bus.subscribe();
    let shutdown = ctx.shutdown.clone();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(AppEvent::RefreshRequested) => {
                    let now = Utc::now();
                    match handle.load_events(now, now + Duration::days(REFRESH_WINDOW_DAYS)).await {
                        Ok(events) => info!("Calendar refreshed, {} events cached", events.len()),
                        Err(e) => warn!("Calendar refresh failed: {}", e),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Calendar listener skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[async_trait]
impl super::Component for GoogleCalendar {
    fn name(&self) -> &'static str {
        "google_calendar"
    }

    async fn init(&self, ctx: &AppContext) -> AppResult<()> {
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_some() {
            return Ok(());
        }

        let client = GoogleCalendarClient::with_endpoints(
            ctx.store.clone(),
            ctx.http.clone(),
            self.endpoints.clone(),
        );
        let handle = GoogleCalendarHandle::new(client, ctx.store.clone());
        if !handle.has_valid_credentials().await? {
            info!("Google Calendar not configured, serving cached events only");
        }

        spawn_refresh_listener(ctx, handle.clone());
        *handle_lock = Some(handle);
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        if let Some(handle) = &*self.handle.read().await {
            handle.shutdown().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
