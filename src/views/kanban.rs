use crate::components::local_store::{LocalStore, Task, TaskStatus, TaskUpdate};
use crate::error::{validation_error, AppResult, Error};
use crate::utils::time::{add_one_month, start_of_week};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KanbanColumnId {
    Overdue,
    Today,
    ThisWeek,
    Later,
    Completed,
}

impl KanbanColumnId {
    /// Board order, left to right
    pub const ALL: [KanbanColumnId; 5] = [
        Self::Overdue,
        Self::Today,
        Self::ThisWeek,
        Self::Later,
        Self::Completed,
    ];

    pub fn title(&self) -> String {
        match self {
            Self::Overdue => t!("column_overdue").to_string(),
            Self::Today => t!("column_today").to_string(),
            Self::ThisWeek => t!("column_this_week").to_string(),
            Self::Later => t!("column_later").to_string(),
            Self::Completed => t!("column_completed").to_string(),
        }
    }
}

impl FromStr for KanbanColumnId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overdue" => Ok(Self::Overdue),
            "today" => Ok(Self::Today),
            "this-week" => Ok(Self::ThisWeek),
            "later" => Ok(Self::Later),
            "completed" => Ok(Self::Completed),
            other => Err(validation_error(&format!("Unknown column: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KanbanColumn {
    pub id: KanbanColumnId,
    pub title: String,
    pub tasks: Vec<Task>,
}

/// Column a task belongs in, with days and weeks taken in `tz`
pub fn column_for(task: &Task, now: DateTime<Utc>, tz: &Tz) -> KanbanColumnId {
    if task.completed {
        return KanbanColumnId::Completed;
    }
    let Some(due) = task.due_date else {
        return KanbanColumnId::Later;
    };

    let today = now.with_timezone(tz).date_naive();
    let due_day = due.with_timezone(tz).date_naive();

    if due_day == today {
        KanbanColumnId::Today
    } else if due < now {
        KanbanColumnId::Overdue
    } else if start_of_week(due_day) == start_of_week(today) {
        KanbanColumnId::ThisWeek
    } else {
        KanbanColumnId::Later
    }
}

/// All five columns, each keeping the store order of its tasks
pub fn build_board(tasks: Vec<Task>, now: DateTime<Utc>, tz: &Tz) -> Vec<KanbanColumn> {
    let mut columns: Vec<KanbanColumn> = KanbanColumnId::ALL
        .iter()
        .map(|id| KanbanColumn {
            id: *id,
            title: id.title(),
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        let id = column_for(&task, now, tz);
        if let Some(column) = columns.iter_mut().find(|c| c.id == id) {
            column.tasks.push(task);
        }
    }

    columns
}

/// Changes implied by dropping a task into `column`
pub fn column_update(column: KanbanColumnId, now: DateTime<Utc>) -> TaskUpdate {
    match column {
        KanbanColumnId::Completed => TaskUpdate {
            completed: Some(true),
            status: Some(TaskStatus::Completed),
            ..Default::default()
        },
        KanbanColumnId::Today => TaskUpdate {
            completed: Some(false),
            due_date: Some(Some(now)),
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        },
        KanbanColumnId::ThisWeek => TaskUpdate {
            completed: Some(false),
            due_date: Some(Some(now + Duration::days(7))),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        },
        KanbanColumnId::Later => TaskUpdate {
            completed: Some(false),
            due_date: Some(Some(add_one_month(now))),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        },
        KanbanColumnId::Overdue => TaskUpdate {
            completed: Some(false),
            status: Some(TaskStatus::Overdue),
            ..Default::default()
        },
    }
}

pub async fn move_task_to_column(
    store: &LocalStore,
    id: &str,
    column: KanbanColumnId,
    now: DateTime<Utc>,
) -> AppResult<Option<Task>> {
    store.update_task(id, column_update(column, now)).await
}
