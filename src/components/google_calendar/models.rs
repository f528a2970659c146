use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Event status as reported by Google Calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// Calendar event, either owned by Google Calendar or synthesized locally
/// with a `local_` id while offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CalendarEvent {
    /// Whether the event was created locally rather than by Google Calendar
    pub fn is_local(&self) -> bool {
        self.id.starts_with("local_")
    }
}

/// Event fields for creation; the id comes from Google or the local fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendarEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl NewCalendarEvent {
    /// Attach an id, producing a confirmed event
    pub fn into_event(self, id: String) -> CalendarEvent {
        CalendarEvent {
            id,
            title: self.title,
            description: self.description,
            start: self.start,
            end: self.end,
            all_day: Some(self.all_day),
            color: None,
            status: EventStatus::Confirmed,
            attendees: Some(self.attendees),
            location: self.location,
        }
    }

    /// Request body for `events.insert`
    pub fn to_api_body(&self) -> Value {
        let (start, end) = if self.all_day {
            (
                json!({ "date": self.start.format("%Y-%m-%d").to_string() }),
                json!({ "date": self.end.format("%Y-%m-%d").to_string() }),
            )
        } else {
            (
                json!({ "dateTime": self.start.to_rfc3339() }),
                json!({ "dateTime": self.end.to_rfc3339() }),
            )
        };

        json!({
            "summary": self.title,
            "description": self.description,
            "start": start,
            "end": end,
            "location": self.location,
        })
    }
}

/// OAuth client credentials as persisted under `google_credentials`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl GoogleCredentials {
    pub fn is_valid(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Calendar to query, `primary` unless configured
    pub fn calendar_id(&self) -> &str {
        self.calendar_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or("primary")
    }
}

/// Start or end of an event in the Google API shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl ApiEventTime {
    /// Resolve to an instant; all-day dates are taken as UTC midnight
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAttendee {
    pub email: Option<String>,
}

/// Event resource as returned by the Google Calendar API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub start: ApiEventTime,
    #[serde(default)]
    pub end: ApiEventTime,
    pub status: Option<EventStatus>,
    pub location: Option<String>,
    pub attendees: Option<Vec<ApiAttendee>>,
}

impl ApiEvent {
    /// Convert to the local event shape; `None` if start or end is unreadable
    pub fn into_event(self, untitled: &str) -> Option<CalendarEvent> {
        let start = self.start.to_utc()?;
        let end = self.end.to_utc()?;
        let all_day = self.start.date_time.is_none();
        let attendees = self
            .attendees
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.email)
            .collect();

        Some(CalendarEvent {
            id: self.id,
            title: self
                .summary
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| untitled.to_string()),
            description: self.description,
            start,
            end,
            all_day: Some(all_day),
            color: None,
            status: self.status.unwrap_or_default(),
            attendees: Some(attendees),
            location: self.location,
        })
    }
}

/// `events.list` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEventList {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
}
