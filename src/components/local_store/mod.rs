//! Persistent collections of tasks, cached events, alerts and settings.
//!
//! Each collection is a JSON value under its own key in a flat namespace,
//! mirroring the keys the web client used in browser storage.

mod backend;
pub mod models;

pub use backend::{FileBackend, MemoryBackend, RedisBackend, StorageBackend};
pub use models::{
    calculate_task_status, AlertKind, NewNotification, NewTask, NotificationAlert, Settings,
    Task, TaskPriority, TaskStatus, TaskUpdate,
};

use crate::components::google_calendar::models::CalendarEvent;
use crate::config::{Config, StoreBackendKind};
use crate::error::AppResult;
use crate::utils::ids::generate_id;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Store key constants
pub mod keys {
    pub const TASKS: &str = "calendar_tasks";
    pub const CACHED_EVENTS: &str = "cached_calendar_events";
    pub const NOTIFICATIONS: &str = "notification_alerts";
    pub const SETTINGS: &str = "app_settings";
    pub const GOOGLE_CREDENTIALS: &str = "google_credentials";
    pub const GOOGLE_ACCESS_TOKEN: &str = "google_access_token";
    pub const GOOGLE_REFRESH_TOKEN: &str = "google_refresh_token";
    pub const VOICE_AGENT_CREDENTIALS: &str = "voice_agent_credentials";
}

/// Alerts are raised for tasks due within this horizon
pub const NOTIFICATION_HORIZON_MINUTES: i64 = 30;

/// Typed access to the persisted collections
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
    // Serializes read-modify-write sequences within this process
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Open the backend selected in the configuration
    pub async fn open(config: &Config) -> AppResult<Self> {
        let backend: Arc<dyn StorageBackend> = match config.store_backend {
            StoreBackendKind::File => Arc::new(FileBackend::new(&config.data_dir).await?),
            StoreBackendKind::Redis => Arc::new(RedisBackend::connect(&config.redis_url).await?),
            StoreBackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        info!("Local store using {} backend", backend.name());
        Ok(Self::new(backend))
    }

    /// Read and deserialize a value, `None` when the key is absent
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value
    pub async fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, raw).await
    }

    pub async fn remove_value(&self, key: &str) -> AppResult<()> {
        self.backend.remove(key).await
    }

    async fn get_list<T: DeserializeOwned>(&self, key: &str) -> AppResult<Vec<T>> {
        Ok(self.get_value::<Vec<T>>(key).await?.unwrap_or_default())
    }

    // Tasks

    pub async fn get_tasks(&self) -> AppResult<Vec<Task>> {
        self.get_list(keys::TASKS).await
    }

    pub async fn save_tasks(&self, tasks: &[Task]) -> AppResult<()> {
        self.set_value(keys::TASKS, tasks).await
    }

    /// Persist a new task with a generated id and fresh timestamps
    pub async fn add_task(&self, new_task: NewTask) -> AppResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: generate_id("task"),
            title: new_task.title,
            description: new_task.description,
            due_date: new_task.due_date,
            completed: new_task.completed,
            priority: new_task.priority,
            tags: new_task.tags,
            color: new_task.color,
            status: new_task.status,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.write_lock.lock().await;
        let mut tasks = self.get_tasks().await?;
        tasks.push(task.clone());
        self.save_tasks(&tasks).await?;

        debug!("Added task {} ({})", task.id, task.title);
        Ok(task)
    }

    /// Merge `update` into the task with `id`; `None` if no such task
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> AppResult<Option<Task>> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.get_tasks().await?;

        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.apply(update);
        task.updated_at = Utc::now();
        let updated = task.clone();

        self.save_tasks(&tasks).await?;
        Ok(Some(updated))
    }

    /// Flip completion; un-completing recomputes the status from the due date
    pub async fn toggle_task(&self, id: &str) -> AppResult<Option<Task>> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.get_tasks().await?;

        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        let now = Utc::now();
        task.completed = !task.completed;
        task.status = calculate_task_status(task, now);
        task.updated_at = now;
        let updated = task.clone();

        self.save_tasks(&tasks).await?;
        Ok(Some(updated))
    }

    pub async fn delete_task(&self, id: &str) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let tasks = self.get_tasks().await?;
        let before = tasks.len();
        let remaining: Vec<Task> = tasks.into_iter().filter(|t| t.id != id).collect();

        if remaining.len() == before {
            return Ok(false);
        }

        self.save_tasks(&remaining).await?;
        Ok(true)
    }

    /// Open tasks due within the next 30 minutes (inclusive on both ends)
    pub async fn tasks_needing_notification(&self, now: DateTime<Utc>) -> AppResult<Vec<Task>> {
        let horizon = now + Duration::minutes(NOTIFICATION_HORIZON_MINUTES);
        let tasks = self.get_tasks().await?;

        Ok(tasks
            .into_iter()
            .filter(|task| match (task.completed, task.due_date) {
                (false, Some(due)) => due >= now && due <= horizon,
                _ => false,
            })
            .collect())
    }

    // Events cache

    pub async fn get_cached_events(&self) -> AppResult<Vec<CalendarEvent>> {
        self.get_list(keys::CACHED_EVENTS).await
    }

    pub async fn save_cached_events(&self, events: &[CalendarEvent]) -> AppResult<()> {
        self.set_value(keys::CACHED_EVENTS, events).await
    }

    pub async fn append_cached_event(&self, event: CalendarEvent) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.get_cached_events().await?;
        events.push(event);
        self.save_cached_events(&events).await
    }

    // Notifications

    pub async fn get_notifications(&self) -> AppResult<Vec<NotificationAlert>> {
        self.get_list(keys::NOTIFICATIONS).await
    }

    pub async fn save_notifications(&self, notifications: &[NotificationAlert]) -> AppResult<()> {
        self.set_value(keys::NOTIFICATIONS, notifications).await
    }

    pub async fn add_notification(&self, new: NewNotification) -> AppResult<NotificationAlert> {
        let alert = NotificationAlert {
            id: generate_id("notif"),
            kind: new.kind,
            title: new.title,
            time_remaining: new.time_remaining,
            due_date: new.due_date,
            dismissed: new.dismissed,
        };

        let _guard = self.write_lock.lock().await;
        let mut notifications = self.get_notifications().await?;
        notifications.push(alert.clone());
        self.save_notifications(&notifications).await?;
        Ok(alert)
    }

    /// Mark an alert dismissed; unknown ids are ignored
    pub async fn dismiss_notification(&self, id: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut notifications = self.get_notifications().await?;
        for n in notifications.iter_mut().filter(|n| n.id == id) {
            n.dismissed = true;
        }
        self.save_notifications(&notifications).await
    }

    // Settings

    /// Stored settings layered over the defaults
    pub async fn get_settings(&self) -> AppResult<Settings> {
        let mut settings = Settings::default();
        if let Some(stored) = self.get_value::<Settings>(keys::SETTINGS).await? {
            for (key, value) in stored.0 {
                settings.set(&key, value);
            }
        }
        Ok(settings)
    }

    pub async fn save_setting(&self, key: &str, value: Value) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.get_settings().await?;
        settings.set(key, value);
        self.set_value(keys::SETTINGS, &settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str, due_date: Option<DateTime<Utc>>, completed: bool) -> NewTask {
        NewTask {
            title: title.to_string(),
            due_date,
            completed,
            ..NewTask::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_reload_task() {
        let store = LocalStore::in_memory();
        let due = Utc::now() + Duration::hours(3);
        let created = store
            .add_task(NewTask {
                description: Some("integral".to_string()),
                priority: TaskPriority::High,
                tags: Some(vec!["casa".to_string()]),
                ..new_task("Comprar pão", Some(due), false)
            })
            .await
            .unwrap();

        assert!(created.id.starts_with("task_"));
        assert_eq!(created.created_at, created.updated_at);

        let tasks = store.get_tasks().await.unwrap();
        assert_eq!(tasks, vec![created]);
    }

    #[tokio::test]
    async fn test_update_task_bumps_updated_at() {
        let store = LocalStore::in_memory();
        let created = store.add_task(new_task("Ler", None, false)).await.unwrap();

        let updated = store
            .update_task(
                &created.id,
                TaskUpdate {
                    title: Some("Ler livro".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Ler livro");
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);

        assert!(store
            .update_task("missing", TaskUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_toggle_task_keeps_status_consistent() {
        let store = LocalStore::in_memory();
        let due = Utc::now() + Duration::days(5);
        let created = store.add_task(new_task("Pagar conta", Some(due), false)).await.unwrap();

        let done = store.toggle_task(&created.id).await.unwrap().unwrap();
        assert!(done.completed);
        assert_eq!(done.status, TaskStatus::Completed);

        let reopened = store.toggle_task(&created.id).await.unwrap().unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_delete_task() {
        let store = LocalStore::in_memory();
        let created = store.add_task(new_task("Apagar", None, false)).await.unwrap();
        assert!(store.delete_task(&created.id).await.unwrap());
        assert!(!store.delete_task(&created.id).await.unwrap());
        assert!(store.get_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tasks_needing_notification_window() {
        let store = LocalStore::in_memory();
        let now = Utc::now();
        store.add_task(new_task("em 45 min", Some(now + Duration::minutes(45)), false)).await.unwrap();
        store.add_task(new_task("em 10 min", Some(now + Duration::minutes(10)), false)).await.unwrap();
        store.add_task(new_task("feita", Some(now + Duration::minutes(10)), true)).await.unwrap();
        store.add_task(new_task("sem data", None, false)).await.unwrap();
        store.add_task(new_task("passada", Some(now - Duration::minutes(1)), false)).await.unwrap();

        let due = store.tasks_needing_notification(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "em 10 min");
    }

    #[tokio::test]
    async fn test_notifications_dismiss() {
        let store = LocalStore::in_memory();
        let alert = store
            .add_notification(NewNotification {
                kind: AlertKind::Task,
                title: "Reunião".to_string(),
                time_remaining: "10min restantes".to_string(),
                due_date: Utc::now(),
                dismissed: false,
            })
            .await
            .unwrap();
        assert!(alert.id.starts_with("notif_"));

        store.dismiss_notification(&alert.id).await.unwrap();
        let all = store.get_notifications().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].dismissed);
    }

    #[tokio::test]
    async fn test_settings_defaults_and_save() {
        let store = LocalStore::in_memory();
        assert!(store.get_settings().await.unwrap().notifications_enabled());

        store
            .save_setting("notificationsEnabled", Value::from(false))
            .await
            .unwrap();
        store.save_setting("viewMode", Value::from("agenda")).await.unwrap();

        let settings = store.get_settings().await.unwrap();
        assert!(!settings.notifications_enabled());
        assert_eq!(settings.get("viewMode"), Some(&Value::from("agenda")));
        // Defaults survive a partial save
        assert_eq!(settings.get("theme"), Some(&Value::from("system")));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_serialization_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set(keys::TASKS, "not json".to_string()).await.unwrap();
        let store = LocalStore::new(backend);
        assert!(matches!(
            store.get_tasks().await,
            Err(crate::error::Error::Serialization(_))
        ));
    }
}
