use crate::components::local_store::{AlertKind, LocalStore, NewNotification, NotificationAlert};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Human-readable time until `due`, in whole minutes rounded down
pub fn time_remaining(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (due - now).num_minutes();

    if minutes <= 0 {
        t!("time_overdue").to_string()
    } else if minutes < 60 {
        t!("time_minutes", minutes = minutes).to_string()
    } else {
        let hours = minutes / 60;
        let rest = minutes % 60;
        t!("time_hours", hours = hours, minutes = rest).to_string()
    }
}

/// Raise alerts for tasks entering the notification horizon.
///
/// A task gets a new alert unless a non-dismissed alert with the same title
/// already exists. Returns every non-dismissed alert.
pub async fn check_for_notifications(store: &LocalStore, now: DateTime<Utc>) -> AppResult<Vec<NotificationAlert>> {
    let tasks = store.tasks_needing_notification(now).await?;
    let mut active: Vec<NotificationAlert> = store
        .get_notifications()
        .await?
        .into_iter()
        .filter(|n| !n.dismissed)
        .collect();

    for task in tasks {
        let Some(due_date) = task.due_date else {
            continue;
        };

        let exists = active
            .iter()
            .any(|n| n.kind == AlertKind::Task && n.title == task.title);
        if exists {
            continue;
        }

        debug!("Raising alert for task {}", task.id);
        let alert = store
            .add_notification(NewNotification {
                kind: AlertKind::Task,
                title: task.title.clone(),
                time_remaining: time_remaining(due_date, now),
                due_date,
                dismissed: false,
            })
            .await?;
        active.push(alert);
    }

    Ok(active)
}
