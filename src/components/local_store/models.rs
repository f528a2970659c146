use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{validation_error, Error};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(validation_error(&format!("Unknown priority: {}", other))),
        }
    }
}

/// Task status, stored alongside `completed` and derivable from it and the due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        };
        f.write_str(s)
    }
}

/// A locally owned task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task fields supplied by callers; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub priority: TaskPriority,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub status: TaskStatus,
}

/// Partial update applied by `LocalStore::update_task`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Option<Vec<String>>>,
    pub status: Option<TaskStatus>,
}

impl Task {
    /// Apply a partial update in place, leaving `updated_at` to the caller
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }
}

/// Derive a task's status from completion and due date.
///
/// `completed` wins; no due date is pending; a past due date is overdue;
/// a due date at most 24 hours away is in progress.
pub fn calculate_task_status(task: &Task, now: DateTime<Utc>) -> TaskStatus {
    if task.completed {
        return TaskStatus::Completed;
    }

    let Some(due) = task.due_date else {
        return TaskStatus::Pending;
    };

    if due < now {
        return TaskStatus::Overdue;
    }

    if due - now <= Duration::days(1) {
        return TaskStatus::InProgress;
    }

    TaskStatus::Pending
}

/// What a notification alert refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Task,
    Event,
}

/// A persisted "due soon" alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub time_remaining: String,
    pub due_date: DateTime<Utc>,
    pub dismissed: bool,
}

/// Alert fields supplied by callers; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: AlertKind,
    pub title: String,
    pub time_remaining: String,
    pub due_date: DateTime<Utc>,
    pub dismissed: bool,
}

/// Free-form application settings with the original defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub Map<String, Value>);

impl Default for Settings {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("theme".to_string(), Value::from("system"));
        map.insert("viewMode".to_string(), Value::from("simple"));
        map.insert("simpleTab".to_string(), Value::from("today"));
        map.insert("agendaTab".to_string(), Value::from("month"));
        map.insert("notificationsEnabled".to_string(), Value::from(true));
        Self(map)
    }
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.get("notificationsEnabled")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(completed: bool, due_date: Option<DateTime<Utc>>) -> Task {
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        Task {
            id: "task_1".to_string(),
            title: "Comprar leite".to_string(),
            description: None,
            due_date,
            completed,
            priority: TaskPriority::Medium,
            tags: None,
            color: None,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_completed_wins() {
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        let t = task(true, Some(now - Duration::days(3)));
        assert_eq!(calculate_task_status(&t, now), TaskStatus::Completed);
    }

    #[test]
    fn test_status_by_due_date() {
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        assert_eq!(calculate_task_status(&task(false, None), now), TaskStatus::Pending);
        assert_eq!(
            calculate_task_status(&task(false, Some(now - Duration::minutes(1))), now),
            TaskStatus::Overdue
        );
        assert_eq!(
            calculate_task_status(&task(false, Some(now + Duration::hours(5))), now),
            TaskStatus::InProgress
        );
        assert_eq!(
            calculate_task_status(&task(false, Some(now + Duration::days(1))), now),
            TaskStatus::InProgress
        );
        assert_eq!(
            calculate_task_status(&task(false, Some(now + Duration::days(3))), now),
            TaskStatus::Pending
        );
    }

    #[test]
    fn test_task_json_shape() {
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        let mut t = task(false, Some(now));
        t.status = TaskStatus::InProgress;
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["dueDate"], "2025-06-18T12:00:00Z");
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["priority"], "medium");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_alert_kind_serialized_as_type() {
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        let alert = NotificationAlert {
            id: "notif_1".to_string(),
            kind: AlertKind::Task,
            title: "Reunião".to_string(),
            time_remaining: "10min restantes".to_string(),
            due_date: now,
            dismissed: false,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["timeRemaining"], "10min restantes");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert!(settings.notifications_enabled());
        assert_eq!(settings.get("viewMode"), Some(&Value::from("simple")));
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }
}
