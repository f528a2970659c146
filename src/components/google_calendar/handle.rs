use super::actor::{GoogleCalendarActor, GoogleCalendarActorHandle};
use super::client::GoogleCalendarClient;
use super::models::{CalendarEvent, GoogleCredentials, NewCalendarEvent};
use crate::components::local_store::LocalStore;
use crate::error::AppResult;
use crate::utils::ids::generate_id;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Result of creating an event, remote or local fallback
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedEvent {
    Remote(CalendarEvent),
    /// Google was unavailable or not configured; `sync_failed` tells the
    /// two apart
    Local {
        event: CalendarEvent,
        sync_failed: bool,
    },
}

impl CreatedEvent {
    pub fn event(&self) -> &CalendarEvent {
        match self {
            Self::Remote(event) | Self::Local { event, .. } => event,
        }
    }
}

/// Handle for interacting with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarHandle {
    actor_handle: GoogleCalendarActorHandle,
    store: Arc<LocalStore>,
    _actor_task: Arc<JoinHandle<()>>,
}

impl GoogleCalendarHandle {
    /// Create a new GoogleCalendarHandle and spawn the actor
    pub fn new(client: GoogleCalendarClient, store: Arc<LocalStore>) -> Self {
        let (mut actor, handle) = GoogleCalendarActor::new(Arc::new(client));

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            store,
            _actor_task: Arc::new(actor_task),
        }
    }

    pub async fn auth_url(&self) -> AppResult<String> {
        self.actor_handle.auth_url().await
    }

    pub async fn exchange_code(&self, code: impl Into<String>) -> AppResult<()> {
        self.actor_handle.exchange_code(code.into()).await
    }

    pub async fn set_credentials(&self, credentials: GoogleCredentials) -> AppResult<()> {
        self.actor_handle.set_credentials(credentials).await
    }

    pub async fn clear_credentials(&self) -> AppResult<()> {
        self.actor_handle.clear_credentials().await
    }

    pub async fn has_valid_credentials(&self) -> AppResult<bool> {
        self.actor_handle.has_valid_credentials().await
    }

    pub async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<CalendarEvent>> {
        self.actor_handle.get_events(start, end).await
    }

    pub async fn create_event(&self, event: NewCalendarEvent) -> AppResult<CalendarEvent> {
        self.actor_handle.create_event(event).await
    }

    pub async fn test_connection(&self) -> AppResult<bool> {
        self.actor_handle.test_connection().await
    }

    /// Fetch events and refresh the cache; fall back to cached events when
    /// not configured or when the fetch fails
    pub async fn load_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<CalendarEvent>> {
        if !self.has_valid_credentials().await? {
            return self.store.get_cached_events().await;
        }

        match self.get_events(start, end).await {
            Ok(events) => {
                self.store.save_cached_events(&events).await?;
                Ok(events)
            }
            Err(e) => {
                warn!("Falling back to cached events: {}", e);
                self.store.get_cached_events().await
            }
        }
    }

    /// Create remotely when possible, otherwise keep a `local_` event in the cache
    pub async fn create_event_with_fallback(&self, event: NewCalendarEvent) -> AppResult<CreatedEvent> {
        if self.has_valid_credentials().await? {
            match self.create_event(event.clone()).await {
                Ok(created) => {
                    info!("Created event {} in Google Calendar", created.id);
                    return Ok(CreatedEvent::Remote(created));
                }
                Err(e) => {
                    warn!("Failed to create event in Google Calendar: {}", e);
                    let local = event.into_event(generate_id("local"));
                    self.store.append_cached_event(local.clone()).await?;
                    return Ok(CreatedEvent::Local {
                        event: local,
                        sync_failed: true,
                    });
                }
            }
        }

        let local = event.into_event(generate_id("local"));
        self.store.append_cached_event(local.clone()).await?;
        Ok(CreatedEvent::Local {
            event: local,
            sync_failed: false,
        })
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        self.actor_handle.shutdown().await
    }
}
