mod feed;
mod handlers;

pub use feed::{ClientFeed, ToastView};

use crate::components::google_calendar::GoogleCalendarHandle;
use crate::components::local_store::LocalStore;
use crate::components::voice::{RecognitionSettings, VoiceAgentClient, VoiceSession};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono_tz::Tz;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state for all routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LocalStore>,
    pub tz: Tz,
    /// Used by the agent proxy route, which takes its endpoint from headers
    pub agent: VoiceAgentClient,
    /// `None` when the component is disabled
    pub calendar: Option<GoogleCalendarHandle>,
    pub voice: Option<Arc<VoiceSession>>,
    /// Toasts and alerts waiting for clients
    pub feed: ClientFeed,
    /// Served to clients that run the recogniser themselves
    pub speech: RecognitionSettings,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/auth", get(handlers::oauth_callback_handler))
        .route("/api/calendar/auth-url", get(handlers::auth_url_handler))
        .route("/api/voice/agent", post(handlers::voice_agent_proxy_handler))
        .route("/api/voice/command", post(handlers::voice_command_handler))
        .route("/api/voice/settings", get(handlers::speech_settings_handler))
        .route("/api/calendar/credentials", delete(handlers::clear_calendar_credentials_handler))
        .route("/api/toasts", get(handlers::list_toasts_handler))
        .route("/api/toasts/{id}/activate", post(handlers::activate_toast_handler))
        .route("/api/toasts/{id}/dismiss", post(handlers::dismiss_toast_handler))
        .route("/api/tasks", get(handlers::list_tasks_handler))
        .route("/api/tasks/{id}", delete(handlers::delete_task_handler))
        .route("/api/tasks/{id}/toggle", post(handlers::toggle_task_handler))
        .route("/api/tasks/{id}/move", post(handlers::move_task_handler))
        .route("/api/kanban", get(handlers::kanban_handler))
        .route("/api/agenda", get(handlers::agenda_handler))
        .route("/api/notifications", get(handlers::notifications_handler))
        .route(
            "/api/notifications/{id}/dismiss",
            post(handlers::dismiss_notification_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
