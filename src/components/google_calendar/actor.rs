use super::client::GoogleCalendarClient;
use super::models::{CalendarEvent, GoogleCredentials, NewCalendarEvent};
use crate::error::{google_calendar_error, AppResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// The Google Calendar actor that processes messages
pub struct GoogleCalendarActor {
    client: Arc<GoogleCalendarClient>,
    command_rx: mpsc::Receiver<GoogleCalendarCommand>,
}

/// Commands that can be sent to the Google Calendar actor
pub enum GoogleCalendarCommand {
    AuthUrl(oneshot::Sender<AppResult<String>>),
    ExchangeCode(String, oneshot::Sender<AppResult<()>>),
    SetCredentials(GoogleCredentials, oneshot::Sender<AppResult<()>>),
    ClearCredentials(oneshot::Sender<AppResult<()>>),
    HasValidCredentials(oneshot::Sender<bool>),
    GetEvents {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reply: oneshot::Sender<AppResult<Vec<CalendarEvent>>>,
    },
    CreateEvent(NewCalendarEvent, oneshot::Sender<AppResult<CalendarEvent>>),
    TestConnection(oneshot::Sender<bool>),
    Shutdown,
}

/// Handle for communicating with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarActorHandle {
    command_tx: mpsc::Sender<GoogleCalendarCommand>,
}

impl GoogleCalendarActorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GoogleCalendarCommand,
    ) -> AppResult<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|e| google_calendar_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .await
            .map_err(|_| google_calendar_error("Response channel closed"))
    }

    pub async fn auth_url(&self) -> AppResult<String> {
        self.request(GoogleCalendarCommand::AuthUrl).await?
    }

    pub async fn exchange_code(&self, code: String) -> AppResult<()> {
        self.request(|tx| GoogleCalendarCommand::ExchangeCode(code, tx)).await?
    }

    pub async fn set_credentials(&self, credentials: GoogleCredentials) -> AppResult<()> {
        self.request(|tx| GoogleCalendarCommand::SetCredentials(credentials, tx)).await?
    }

    pub async fn clear_credentials(&self) -> AppResult<()> {
        self.request(GoogleCalendarCommand::ClearCredentials).await?
    }

    pub async fn has_valid_credentials(&self) -> AppResult<bool> {
        self.request(GoogleCalendarCommand::HasValidCredentials).await
    }

    pub async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<CalendarEvent>> {
        self.request(|reply| GoogleCalendarCommand::GetEvents { start, end, reply })
            .await?
    }

    pub async fn create_event(&self, event: NewCalendarEvent) -> AppResult<CalendarEvent> {
        self.request(|tx| GoogleCalendarCommand::CreateEvent(event, tx)).await?
    }

    pub async fn test_connection(&self) -> AppResult<bool> {
        self.request(GoogleCalendarCommand::TestConnection).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.command_tx.send(GoogleCalendarCommand::Shutdown).await;
        Ok(())
    }
}

impl GoogleCalendarActor {
    /// Create a new actor and return its handle
    pub fn new(client: Arc<GoogleCalendarClient>) -> (Self, GoogleCalendarActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self { client, command_rx };
        let handle = GoogleCalendarActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Google Calendar actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                GoogleCalendarCommand::AuthUrl(reply) => {
                    let _ = reply.send(self.client.auth_url().await);
                }
                GoogleCalendarCommand::ExchangeCode(code, reply) => {
                    let _ = reply.send(self.client.exchange_code_for_token(&code).await);
                }
                GoogleCalendarCommand::SetCredentials(credentials, reply) => {
                    let _ = reply.send(self.client.set_credentials(credentials).await);
                }
                GoogleCalendarCommand::ClearCredentials(reply) => {
                    let _ = reply.send(self.client.clear_credentials().await);
                }
                GoogleCalendarCommand::HasValidCredentials(reply) => {
                    let _ = reply.send(self.client.has_valid_credentials().await);
                }
                GoogleCalendarCommand::GetEvents { start, end, reply } => {
                    let _ = reply.send(self.client.get_events(start, end).await);
                }
                GoogleCalendarCommand::CreateEvent(event, reply) => {
                    let _ = reply.send(self.client.create_event(&event).await);
                }
                GoogleCalendarCommand::TestConnection(reply) => {
                    let _ = reply.send(self.client.test_connection().await);
                }
                GoogleCalendarCommand::Shutdown => {
                    info!("Google Calendar actor shutting down");
                    break;
                }
            }
        }

        info!("Google Calendar actor shut down");
    }
}
