use super::protocol::{ResponseAction, ResponseData, ResponseStatus, ResponseType, TaskDraft, VoiceAgentResponse};
use crate::components::local_store::{LocalStore, Task};
use crate::error::AppResult;
use crate::events::{AppEvent, EventBus, NeedsInfoRequest, Toast, ToastAction, ToastSeverity};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const EVENT_CREATED_TOAST: Duration = Duration::from_secs(10);
const TASK_CREATED_TOAST: Duration = Duration::from_secs(10);
const SUCCESS_TOAST: Duration = Duration::from_secs(8);
const PENDING_TASK_TOAST: Duration = Duration::from_secs(8);
const PENDING_INFO_TOAST: Duration = Duration::from_secs(6);
const ERROR_TOAST: Duration = Duration::from_secs(8);

/// What the handler did with a response
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    TaskCreated(Task),
    RefreshRequested,
    /// Only a toast was raised
    Notified,
}

/// Applies agent responses to the local store and raises toasts.
///
/// Dispatch is on `status`, then `type`, `action` and the presence of task
/// data. No deduplication is done: handling the same response twice creates
/// two tasks.
#[derive(Clone)]
pub struct ResponseHandler {
    store: Arc<LocalStore>,
    bus: EventBus,
}

impl ResponseHandler {
    pub fn new(store: Arc<LocalStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// `original_text` is the command that produced `response`; it feeds the
    /// retry action and stands in for a missing `meta.originalInput`.
    pub async fn handle(&self, response: &VoiceAgentResponse, original_text: &str) -> AppResult<HandlerOutcome> {
        debug!(
            "Handling agent response: status={:?} type={} action={:?}",
            response.status, response.kind, response.action
        );

        match response.status {
            ResponseStatus::Success => self.handle_success(response).await,
            ResponseStatus::Pending => self.handle_pending(response).await,
            ResponseStatus::NeedsInfo => Ok(self.handle_needs_info(response, original_text)),
            ResponseStatus::Error => {
                self.bus.toast(Toast::new(
                    ToastSeverity::Error,
                    response.message.clone(),
                    Some(ERROR_TOAST),
                    ToastAction::Retry {
                        text: original_text.to_string(),
                    },
                ));
                Ok(HandlerOutcome::Notified)
            }
        }
    }

    async fn handle_success(&self, response: &VoiceAgentResponse) -> AppResult<HandlerOutcome> {
        let creates = response.action.as_ref().is_some_and(|a| a.is_creation());

        match (response.kind, &response.data) {
            // The agent already wrote the event to Google; just pull it in
            (ResponseType::Event, _) if response.action == Some(ResponseAction::Created) => {
                self.success_toast(&response.message, EVENT_CREATED_TOAST);
                self.bus.publish(AppEvent::RefreshRequested);
                Ok(HandlerOutcome::RefreshRequested)
            }
            (ResponseType::Task, Some(ResponseData::Task(draft))) if creates => {
                let task = self.create_task(draft).await?;
                self.success_toast(&response.message, TASK_CREATED_TOAST);
                Ok(HandlerOutcome::TaskCreated(task))
            }
            _ => {
                self.success_toast(&response.message, SUCCESS_TOAST);
                Ok(HandlerOutcome::Notified)
            }
        }
    }

    async fn handle_pending(&self, response: &VoiceAgentResponse) -> AppResult<HandlerOutcome> {
        if let (ResponseType::Task, Some(ResponseData::Task(draft))) = (response.kind, &response.data) {
            let task = self.create_task(draft).await?;
            let title = &task.title;
            self.success_toast(&t!("task_created", title = title), PENDING_TASK_TOAST);
            return Ok(HandlerOutcome::TaskCreated(task));
        }

        self.bus.toast(Toast::new(
            ToastSeverity::Info,
            response.message.clone(),
            Some(PENDING_INFO_TOAST),
            ToastAction::Close,
        ));
        Ok(HandlerOutcome::Notified)
    }

    fn handle_needs_info(&self, response: &VoiceAgentResponse, original_text: &str) -> HandlerOutcome {
        let missing = response.missing_fields().to_vec();
        let original_input = response
            .meta
            .as_ref()
            .and_then(|m| m.original_input.clone())
            .unwrap_or_else(|| original_text.to_string());

        let mut toast = Toast::new(
            ToastSeverity::Warning,
            response.message.clone(),
            None,
            ToastAction::CompleteInfo(NeedsInfoRequest {
                entity_type: response.kind.as_str().to_string(),
                missing: missing.clone(),
                original_input,
            }),
        );
        if !missing.is_empty() {
            let fields = missing.join(", ");
            toast = toast.with_description(t!("missing_info", fields = fields));
        }

        self.bus.toast(toast);
        HandlerOutcome::Notified
    }

    async fn create_task(&self, draft: &TaskDraft) -> AppResult<Task> {
        let task = self.store.add_task(draft.clone().into_new_task()).await?;
        info!("Created task {} from voice command", task.id);
        self.bus.publish(AppEvent::TaskCreated(task.clone()));
        Ok(task)
    }

    fn success_toast(&self, message: &str, duration: Duration) {
        self.bus.toast(Toast::new(
            ToastSeverity::Success,
            message,
            Some(duration),
            ToastAction::Close,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::local_store::{TaskPriority, TaskStatus};
    use serde_json::json;
    use tokio::sync::broadcast;

    fn setup() -> (Arc<LocalStore>, ResponseHandler, broadcast::Receiver<AppEvent>) {
        rust_i18n::set_locale("pt-BR");
        let store = Arc::new(LocalStore::in_memory());
        let bus = EventBus::new();
        let rx = bus.subscribe();
        (Arc::clone(&store), ResponseHandler::new(store, bus), rx)
    }

    fn parse(body: serde_json::Value) -> VoiceAgentResponse {
        VoiceAgentResponse::from_body(body, &chrono_tz::America::Sao_Paulo).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn toasts(events: &[AppEvent]) -> Vec<Toast> {
        events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Toast(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pending_task_creates_one_task() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({
            "status": "pending",
            "type": "task",
            "message": "Anotado",
            "data": { "title": "Buy milk", "dueDate": "2025-06-18T18:00:00-03:00" }
        }));

        let outcome = handler.handle(&response, "comprar leite").await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::TaskCreated(_)));

        let tasks = store.get_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert_eq!(tasks[0].priority, TaskPriority::Medium);
        assert!(!tasks[0].completed);
        assert_eq!(tasks[0].status, TaskStatus::Pending);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, AppEvent::TaskCreated(t) if t.title == "Buy milk")));
        let toasts = toasts(&events);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, ToastSeverity::Success);
        assert!(toasts[0].message.contains("Tarefa criada: Buy milk"));
        assert_eq!(toasts[0].duration, Some(PENDING_TASK_TOAST));
    }

    #[tokio::test]
    async fn test_success_task_uses_agent_message() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({
            "status": "success",
            "type": "task",
            "action": "created",
            "message": "Tarefa adicionada!",
            "data": { "title": "Pagar conta", "priority": "high" }
        }));

        handler.handle(&response, "pagar conta").await.unwrap();
        assert_eq!(store.get_tasks().await.unwrap()[0].priority, TaskPriority::High);

        let toasts = toasts(&drain(&mut rx));
        assert_eq!(toasts[0].message, "Tarefa adicionada!");
        assert_eq!(toasts[0].duration, Some(TASK_CREATED_TOAST));
    }

    #[tokio::test]
    async fn test_success_task_without_create_action_only_notifies() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({
            "status": "success",
            "type": "task",
            "action": "none",
            "message": "Nada a fazer",
            "data": { "title": "Pagar conta" }
        }));

        let outcome = handler.handle(&response, "x").await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Notified);
        assert!(store.get_tasks().await.unwrap().is_empty());
        assert_eq!(toasts(&drain(&mut rx))[0].duration, Some(SUCCESS_TOAST));
    }

    #[tokio::test]
    async fn test_success_event_requests_refresh() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({
            "status": "success",
            "type": "event",
            "action": "created",
            "message": "Evento criado"
        }));

        let outcome = handler.handle(&response, "reunião amanhã").await.unwrap();
        assert_eq!(outcome, HandlerOutcome::RefreshRequested);
        assert!(store.get_tasks().await.unwrap().is_empty());
        assert!(store.get_cached_events().await.unwrap().is_empty());

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, AppEvent::RefreshRequested)));
        assert_eq!(toasts(&events)[0].duration, Some(EVENT_CREATED_TOAST));
    }

    #[tokio::test]
    async fn test_pending_without_data_is_info() {
        let (_, handler, mut rx) = setup();
        let response = parse(json!({ "status": "pending", "type": "event", "message": "Processando" }));

        handler.handle(&response, "x").await.unwrap();
        let toasts = toasts(&drain(&mut rx));
        assert_eq!(toasts[0].severity, ToastSeverity::Info);
        assert_eq!(toasts[0].duration, Some(PENDING_INFO_TOAST));
    }

    #[tokio::test]
    async fn test_needs_info_is_sticky_and_carries_missing() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({
            "status": "needs_info",
            "type": "task",
            "message": "Para quando?",
            "meta": { "missing": ["dueDate"] }
        }));

        handler.handle(&response, "lembrar de pagar").await.unwrap();
        assert!(store.get_tasks().await.unwrap().is_empty());

        let toasts = toasts(&drain(&mut rx));
        let toast = &toasts[0];
        assert_eq!(toast.severity, ToastSeverity::Warning);
        assert!(toast.is_sticky());
        assert_eq!(toast.description.as_deref(), Some("Informações em falta: dueDate"));
        match &toast.action {
            ToastAction::CompleteInfo(request) => {
                assert_eq!(request.entity_type, "task");
                assert_eq!(request.missing, vec!["dueDate".to_string()]);
                assert_eq!(request.original_input, "lembrar de pagar");
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_offers_retry_with_original_text() {
        let (store, handler, mut rx) = setup();
        let response = parse(json!({ "status": "error", "type": "unknown", "message": "X" }));

        handler.handle(&response, "marcar dentista").await.unwrap();
        assert!(store.get_tasks().await.unwrap().is_empty());
        assert!(store.get_cached_events().await.unwrap().is_empty());

        let toasts = toasts(&drain(&mut rx));
        assert_eq!(toasts[0].severity, ToastSeverity::Error);
        assert_eq!(toasts[0].message, "X");
        assert_eq!(
            toasts[0].action,
            ToastAction::Retry {
                text: "marcar dentista".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_same_response_twice_creates_two_tasks() {
        let (store, handler, _rx) = setup();
        let response = parse(json!({
            "status": "pending",
            "type": "task",
            "message": "ok",
            "data": { "title": "Regar plantas" }
        }));

        handler.handle(&response, "regar plantas").await.unwrap();
        handler.handle(&response, "regar plantas").await.unwrap();
        assert_eq!(store.get_tasks().await.unwrap().len(), 2);
    }
}
