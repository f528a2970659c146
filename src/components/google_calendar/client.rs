use super::models::{ApiEvent, ApiEventList, CalendarEvent, GoogleCredentials, NewCalendarEvent};
use super::token::TokenManager;
use crate::components::local_store::{keys, LocalStore};
use crate::error::{config_error, google_calendar_error, AppResult};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

/// OAuth scope requested for calendar access
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Base URLs for the Google endpoints, overridable for tests
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// Thin client over the Google Calendar REST API.
///
/// Any non-2xx response is an error; callers decide whether to fall back to
/// cached events.
pub struct GoogleCalendarClient {
    store: Arc<LocalStore>,
    client: Client,
    endpoints: GoogleEndpoints,
    tokens: TokenManager,
    credentials: RwLock<Option<GoogleCredentials>>,
}

impl GoogleCalendarClient {
    pub fn new(store: Arc<LocalStore>, client: Client) -> Self {
        Self::with_endpoints(store, client, GoogleEndpoints::default())
    }

    pub fn with_endpoints(store: Arc<LocalStore>, client: Client, endpoints: GoogleEndpoints) -> Self {
        let tokens = TokenManager::new(Arc::clone(&store), client.clone(), endpoints.token_url.clone());
        Self {
            store,
            client,
            endpoints,
            tokens,
            credentials: RwLock::new(None),
        }
    }

    /// Credentials from memory, falling back to the store
    pub async fn credentials(&self) -> AppResult<Option<GoogleCredentials>> {
        if let Some(creds) = self.credentials.read().await.clone() {
            return Ok(Some(creds));
        }

        let stored: Option<GoogleCredentials> = self.store.get_value(keys::GOOGLE_CREDENTIALS).await?;
        if let Some(creds) = &stored {
            *self.credentials.write().await = Some(creds.clone());
        }
        Ok(stored)
    }

    /// Replace and persist the OAuth client credentials
    pub async fn set_credentials(&self, credentials: GoogleCredentials) -> AppResult<()> {
        self.store.set_value(keys::GOOGLE_CREDENTIALS, &credentials).await?;
        *self.credentials.write().await = Some(credentials);
        Ok(())
    }

    /// Disconnect: drop the client credentials and both tokens
    pub async fn clear_credentials(&self) -> AppResult<()> {
        self.store.remove_value(keys::GOOGLE_CREDENTIALS).await?;
        *self.credentials.write().await = None;
        self.tokens.clear().await?;
        info!("Google Calendar credentials removed");
        Ok(())
    }

    pub async fn has_valid_credentials(&self) -> bool {
        matches!(self.credentials().await, Ok(Some(creds)) if creds.is_valid())
    }

    async fn require_credentials(&self) -> AppResult<GoogleCredentials> {
        self.credentials()
            .await?
            .ok_or_else(|| config_error("No credentials configured"))
    }

    /// Consent screen URL for the authorization-code flow
    pub async fn auth_url(&self) -> AppResult<String> {
        let creds = self.require_credentials().await?;

        let mut url = Url::parse(&self.endpoints.auth_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &creds.client_id)
            .append_pair("redirect_uri", &creds.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", CALENDAR_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url.to_string())
    }

    /// Exchange the code from the `/auth` redirect for tokens
    pub async fn exchange_code_for_token(&self, code: &str) -> AppResult<()> {
        let creds = self.require_credentials().await?;
        self.tokens.exchange_code(&creds, code).await?;
        Ok(())
    }

    fn events_url(&self, calendar_id: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.endpoints.api_base)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| google_calendar_error("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    async fn calendar_id(&self) -> AppResult<String> {
        Ok(self
            .credentials()
            .await?
            .map(|c| c.calendar_id().to_string())
            .unwrap_or_else(|| "primary".to_string()))
    }

    /// Events overlapping `[start, end]`, expanded and ordered by start time
    pub async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<CalendarEvent>> {
        let mut url = self.events_url(&self.calendar_id().await?)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &start.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("timeMax", &end.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self
            .send_authorized("Failed to fetch events", |token| {
                self.client.get(url.clone()).bearer_auth(token)
            })
            .await?;
        let response = check_status(response, "Failed to fetch events").await?;
        let list: ApiEventList = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse events response: {}", e)))?;

        let untitled = t!("untitled_event").to_string();
        let events: Vec<CalendarEvent> = list
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.clone();
                let event = item.into_event(&untitled);
                if event.is_none() {
                    warn!("Skipping event {} with unreadable start/end", id);
                }
                event
            })
            .collect();

        debug!("Fetched {} events", events.len());
        Ok(events)
    }

    /// Create an event and return Google's copy of it
    pub async fn create_event(&self, event: &NewCalendarEvent) -> AppResult<CalendarEvent> {
        let url = self.events_url(&self.calendar_id().await?)?;
        let body = event.to_api_body();

        let response = self
            .send_authorized("Failed to create event", |token| {
                self.client.post(url.clone()).bearer_auth(token).json(&body)
            })
            .await?;
        let response = check_status(response, "Failed to create event").await?;
        let created: ApiEvent = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse created event: {}", e)))?;

        let untitled = t!("untitled_event").to_string();
        created
            .into_event(&untitled)
            .ok_or_else(|| google_calendar_error("Created event has no readable start/end"))
    }

    /// Fetch the next 24 hours to check that credentials and token work
    pub async fn test_connection(&self) -> bool {
        let now = Utc::now();
        match self.get_events(now, now + Duration::hours(24)).await {
            Ok(_) => true,
            Err(e) => {
                error!("Connection test failed: {}", e);
                false
            }
        }
    }

    /// Send the request built by `build` with the stored access token. A 401
    /// refreshes the token once and sends a rebuilt request.
    async fn send_authorized<F>(&self, context: &str, build: F) -> AppResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let send = |token: String| {
            let request = build(&token);
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| google_calendar_error(&format!("{}: {}", context, e)))
            }
        };

        let token = self.tokens.require_access_token().await?;
        let response = send(token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        match self.try_refresh().await {
            Some(token) => send(token).await,
            None => Ok(response),
        }
    }

    async fn try_refresh(&self) -> Option<String> {
        let creds = self.credentials().await.ok().flatten()?;
        match self.tokens.refresh(&creds).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Access token refresh failed: {}", e);
                None
            }
        }
    }
}

async fn check_status(response: Response, context: &str) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());
    Err(google_calendar_error(&format!(
        "{}: HTTP {} - {}",
        context, status, error_body
    )))
}
