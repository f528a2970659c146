use super::{AppState, ToastView};
use crate::components::voice::{
    CommandOutcome, RecognitionSettings, VoiceAgentCredentials, VoiceAgentRequest, VoiceAgentResponse,
};
use crate::error::{component_error, Error};
use crate::utils::time::to_iso_millis;
use crate::views::{build_board, group_by_day, move_task_to_column, tab_range, AgendaTab, KanbanColumnId};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Error type for JSON routes
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Transport(_) | Error::Protocol(_) | Error::GoogleCalendar(_) => StatusCode::BAD_GATEWAY,
            Error::Component(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{} not found: {}", what, id) })),
    )
        .into_response()
}

/// Agent-shaped error body, so clients can feed it to the same handler
fn agent_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "type": "unknown", "message": message })),
    )
        .into_response()
}

pub async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ProxyBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Forward a command to the agent named in the `x-voice-endpoint` header
pub async fn voice_agent_proxy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProxyBody>,
) -> Response {
    let text = body.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return agent_error(StatusCode::BAD_REQUEST, &t!("proxy_missing_text"));
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let Some(endpoint_url) = header("x-voice-endpoint") else {
        return agent_error(StatusCode::BAD_REQUEST, &t!("proxy_missing_endpoint"));
    };

    let credentials = VoiceAgentCredentials {
        endpoint_url,
        auth_token: header("x-voice-token"),
    };
    let request = VoiceAgentRequest {
        text: text.to_string(),
        timestamp: body.timestamp.unwrap_or_else(|| to_iso_millis(&Utc::now())),
    };

    let result = match state.agent.post(&credentials, &request).await {
        Ok(value) => VoiceAgentResponse::from_value(value.clone(), &state.tz).map(|_| value),
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            warn!("Voice agent proxy failed: {}", e);
            let reason = e.to_string();
            agent_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &t!("proxy_agent_error", reason = reason),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandBody {
    text: String,
}

pub async fn voice_command_handler(
    State(state): State<AppState>,
    Json(body): Json<CommandBody>,
) -> ApiResult<Json<CommandOutcome>> {
    let session = state
        .voice
        .as_ref()
        .ok_or_else(|| component_error("Voice assistant is disabled"))?;
    Ok(Json(session.process_command(&body.text).await))
}

/// Toasts raised by commands, retries and background work
pub async fn list_toasts_handler(State(state): State<AppState>) -> Json<Vec<ToastView>> {
    Json(state.feed.toasts().await)
}

/// Run the action behind a toast's button. The action is echoed back so a
/// client can open the form a `completeInfo` action asks for.
pub async fn activate_toast_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.feed.activate(&id).await {
        Some(action) => Json(json!({ "action": action })).into_response(),
        None => not_found("Toast", &id),
    }
}

pub async fn dismiss_toast_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.feed.dismiss(&id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("Toast", &id)
    }
}

pub async fn speech_settings_handler(State(state): State<AppState>) -> Json<RecognitionSettings> {
    Json(state.speech.clone())
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    error: Option<String>,
}

/// Landing page of the Google consent screen redirect
pub async fn oauth_callback_handler(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallback>,
) -> Response {
    if let Some(error) = params.error {
        warn!("Google authorization denied: {}", error);
        return (StatusCode::BAD_REQUEST, t!("auth_failed", error = error).to_string()).into_response();
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, t!("auth_missing_code").to_string()).into_response();
    };
    let Some(calendar) = state.calendar.as_ref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Google Calendar is disabled").into_response();
    };

    match calendar.exchange_code(code).await {
        Ok(()) => {
            info!("Google Calendar connected");
            (StatusCode::OK, t!("auth_success").to_string()).into_response()
        }
        Err(e) => {
            error!("Authorization code exchange failed: {}", e);
            (StatusCode::BAD_GATEWAY, t!("auth_exchange_failed").to_string()).into_response()
        }
    }
}

pub async fn auth_url_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let calendar = state
        .calendar
        .as_ref()
        .ok_or_else(|| component_error("Google Calendar is disabled"))?;
    let url = calendar.auth_url().await?;
    Ok(Json(json!({ "url": url })))
}

/// Forget the Google client credentials and tokens
pub async fn clear_calendar_credentials_handler(State(state): State<AppState>) -> ApiResult<StatusCode> {
    let calendar = state
        .calendar
        .as_ref()
        .ok_or_else(|| component_error("Google Calendar is disabled"))?;
    calendar.clear_credentials().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tasks_handler(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.store.get_tasks().await?).into_response())
}

pub async fn toggle_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    Ok(match state.store.toggle_task(&id).await? {
        Some(task) => Json(task).into_response(),
        None => not_found("Task", &id),
    })
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    column: String,
}

pub async fn move_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveBody>,
) -> ApiResult<Response> {
    let column: KanbanColumnId = body.column.parse()?;
    Ok(match move_task_to_column(&state.store, &id, column, Utc::now()).await? {
        Some(task) => Json(task).into_response(),
        None => not_found("Task", &id),
    })
}

pub async fn delete_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    Ok(if state.store.delete_task(&id).await? {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("Task", &id)
    })
}

pub async fn kanban_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let tasks = state.store.get_tasks().await?;
    Ok(Json(build_board(tasks, Utc::now(), &state.tz)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    tab: Option<String>,
}

pub async fn agenda_handler(
    State(state): State<AppState>,
    Query(query): Query<AgendaQuery>,
) -> ApiResult<Response> {
    let tab = match query.tab.as_deref() {
        Some(raw) => raw.parse::<AgendaTab>()?,
        None => AgendaTab::default(),
    };
    let now = Utc::now();
    let (start, end) = tab_range(tab, now, &state.tz);

    let events = match &state.calendar {
        Some(calendar) => calendar.load_events(start, end).await?,
        None => state.store.get_cached_events().await?,
    };
    let tasks = state.store.get_tasks().await?;

    Ok(Json(group_by_day(tab, tasks, events, now, &state.tz)).into_response())
}

/// Alerts from the scheduler's last check, or the stored ones before it ran
pub async fn notifications_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let active = match state.feed.active_alerts().await {
        Some(alerts) => alerts,
        None => state
            .store
            .get_notifications()
            .await?
            .into_iter()
            .filter(|n| !n.dismissed)
            .collect(),
    };
    Ok(Json(active).into_response())
}

pub async fn dismiss_notification_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.dismiss_notification(&id).await?;
    state.feed.forget_alert(&id).await;
    Ok(StatusCode::NO_CONTENT)
}
