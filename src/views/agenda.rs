use crate::components::google_calendar::CalendarEvent;
use crate::components::local_store::Task;
use crate::error::{validation_error, Error};
use crate::utils::color::color_from_string;
use crate::utils::time::{end_of_day, end_of_month, start_of_day, start_of_month, start_of_week};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Key for tasks without a due date (month view only)
pub const NO_DATE_KEY: &str = "no-date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgendaTab {
    Today,
    Week,
    #[default]
    Month,
}

impl FromStr for AgendaTab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" | "day" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(validation_error(&format!("Unknown agenda tab: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AgendaItem {
    Task(Task),
    Event(CalendarEvent),
}

impl AgendaItem {
    fn sort_key(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Task(task) => task.due_date,
            Self::Event(event) => Some(event.start),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agenda {
    pub tab: AgendaTab,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `YYYY-MM-DD` in the configured timezone, plus `no-date`
    pub days: BTreeMap<String, Vec<AgendaItem>>,
}

fn day_start(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    start_of_day(tz, date)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn day_end(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    end_of_day(tz, date)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| day_start(tz, date) + Duration::days(1) - Duration::milliseconds(1))
}

/// Inclusive instant range covered by `tab` around `now`
pub fn tab_range(tab: AgendaTab, now: DateTime<Utc>, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(tz).date_naive();
    let (first, last) = match tab {
        AgendaTab::Today => (today, today),
        AgendaTab::Week => {
            let sunday = start_of_week(today);
            (sunday, sunday + Duration::days(6))
        }
        AgendaTab::Month => (start_of_month(today), end_of_month(today)),
    };
    (day_start(tz, first), day_end(tz, last))
}

/// Group tasks and events falling inside the tab's range by local day
pub fn group_by_day(
    tab: AgendaTab,
    tasks: Vec<Task>,
    events: Vec<CalendarEvent>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Agenda {
    let (start, end) = tab_range(tab, now, tz);
    let in_range = |at: DateTime<Utc>| at >= start && at <= end;
    let day_key = |at: DateTime<Utc>| at.with_timezone(tz).format("%Y-%m-%d").to_string();

    let mut days: BTreeMap<String, Vec<AgendaItem>> = BTreeMap::new();

    for task in tasks {
        match task.due_date {
            Some(due) if in_range(due) => days.entry(day_key(due)).or_default().push(AgendaItem::Task(task)),
            None if tab == AgendaTab::Month => days
                .entry(NO_DATE_KEY.to_string())
                .or_default()
                .push(AgendaItem::Task(task)),
            _ => {}
        }
    }

    for mut event in events {
        if !in_range(event.start) {
            continue;
        }
        if event.color.is_none() {
            event.color = Some(color_from_string(&event.title));
        }
        days.entry(day_key(event.start))
            .or_default()
            .push(AgendaItem::Event(event));
    }

    for items in days.values_mut() {
        items.sort_by_key(AgendaItem::sort_key);
    }

    Agenda {
        tab,
        start,
        end,
        days,
    }
}
