//! Wire contract with the voice agent webhook.
//!
//! The agent answers with a loosely shaped JSON object. Everything here
//! turns that into typed values once, at the boundary, so the response
//! handler never looks at raw JSON.

use crate::components::local_store::{NewTask, TaskPriority, TaskStatus};
use crate::error::{protocol_error, AppResult};
use crate::utils::time::{parse_flexible_datetime, to_iso_millis};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Request body posted to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAgentRequest {
    pub text: String,
    pub timestamp: String,
}

impl VoiceAgentRequest {
    pub fn new(text: &str, now: DateTime<Utc>) -> Self {
        Self {
            text: text.trim().to_string(),
            timestamp: to_iso_millis(&now),
        }
    }
}

/// Agent endpoint as persisted under `voice_agent_credentials`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAgentCredentials {
    pub endpoint_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl VoiceAgentCredentials {
    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.trim().is_empty()
    }

    /// Bearer token, if one is set and non-empty
    pub fn bearer(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Pending,
    Error,
    NeedsInfo,
}

impl ResponseStatus {
    fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "success" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "error" => Ok(Self::Error),
            "needs_info" => Ok(Self::NeedsInfo),
            other => Err(protocol_error(&format!("Unknown response status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Event,
    Task,
    Unknown,
}

impl ResponseType {
    fn parse(raw: &str) -> Self {
        match raw {
            "event" => Self::Event,
            "task" => Self::Task,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Task => "task",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    Created,
    Create,
    None,
    Other(String),
}

impl ResponseAction {
    fn parse(raw: &str) -> Self {
        match raw {
            "created" => Self::Created,
            "create" => Self::Create,
            "none" => Self::None,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Created | Self::Create)
    }
}

/// Task fields extracted from a `type: task` response
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
}

impl TaskDraft {
    /// A fresh, incomplete, untagged task
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            completed: false,
            priority: self.priority,
            tags: Some(Vec::new()),
            color: None,
            status: TaskStatus::Pending,
        }
    }
}

/// Event details echoed back by the agent after it created the event itself
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Task(TaskDraft),
    Event(EventDraft),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseMeta {
    pub missing: Vec<String>,
    pub original_input: Option<String>,
    pub timestamp: Option<String>,
}

/// A validated agent response
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceAgentResponse {
    pub status: ResponseStatus,
    pub kind: ResponseType,
    pub action: Option<ResponseAction>,
    pub message: String,
    pub data: Option<ResponseData>,
    pub meta: Option<ResponseMeta>,
}

/// Strip one `{"response": {...}}` envelope if present
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("response").is_some_and(Value::is_object) => {
            map.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    }
}

impl VoiceAgentResponse {
    /// Parse a raw webhook body, unwrapping the envelope first.
    ///
    /// Naive dates in `data` are read in `tz`.
    pub fn from_body(body: Value, tz: &Tz) -> AppResult<Self> {
        Self::from_value(unwrap_envelope(body), tz)
    }

    /// Parse an already unwrapped response object
    pub fn from_value(value: Value, tz: &Tz) -> AppResult<Self> {
        let Value::Object(obj) = value else {
            return Err(protocol_error("Voice agent response is not a JSON object"));
        };

        let status = ResponseStatus::parse(required_str(&obj, "status")?)?;
        let kind = ResponseType::parse(required_str(&obj, "type")?);
        let message = required_str(&obj, "message")?.to_string();
        let action = optional_str(&obj, "action")?.map(ResponseAction::parse);

        // needs_info and error never act on data, so partial payloads are fine there
        let data = match (status, obj.get("data")) {
            (ResponseStatus::Success | ResponseStatus::Pending, Some(raw)) if !raw.is_null() => {
                parse_data(kind, raw, tz)?
            }
            _ => None,
        };

        let meta = match obj.get("meta") {
            Some(Value::Object(raw)) => Some(parse_meta(raw)),
            Some(Value::Null) | None => None,
            Some(_) => return Err(protocol_error("'meta' must be an object")),
        };

        Ok(Self {
            status,
            kind,
            action,
            message,
            data,
            meta,
        })
    }

    pub fn missing_fields(&self) -> &[String] {
        self.meta.as_ref().map(|m| m.missing.as_slice()).unwrap_or(&[])
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> AppResult<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(protocol_error(&format!(
            "Voice agent response is missing '{}'",
            field
        ))),
        Some(_) => Err(protocol_error(&format!("'{}' must be a string", field))),
    }
}

fn optional_str<'a>(obj: &'a Map<String, Value>, field: &str) -> AppResult<Option<&'a str>> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.as_str())),
        Some(Value::String(_)) | Some(Value::Null) | None => Ok(None),
        Some(_) => Err(protocol_error(&format!("'{}' must be a string", field))),
    }
}

fn parse_data(kind: ResponseType, raw: &Value, tz: &Tz) -> AppResult<Option<ResponseData>> {
    let Value::Object(obj) = raw else {
        return Err(protocol_error("'data' must be an object"));
    };

    match kind {
        ResponseType::Task => parse_task(obj, tz).map(|draft| Some(ResponseData::Task(draft))),
        ResponseType::Event => Ok(Some(ResponseData::Event(parse_event(obj, tz)))),
        ResponseType::Unknown => {
            debug!("Ignoring data on a response of unknown type");
            Ok(None)
        }
    }
}

fn parse_task(obj: &Map<String, Value>, tz: &Tz) -> AppResult<TaskDraft> {
    let title = [optional_str(obj, "title")?, optional_str(obj, "summary")?]
        .into_iter()
        .flatten()
        .find(|t| !t.trim().is_empty())
        .ok_or_else(|| protocol_error("Task data has neither 'title' nor 'summary'"))?
        .to_string();

    let description = optional_str(obj, "description")?.map(str::to_string);

    let due_date = match optional_str(obj, "dueDate")? {
        Some(raw) => Some(
            parse_flexible_datetime(raw, tz)
                .ok_or_else(|| protocol_error(&format!("Unreadable dueDate '{}'", raw)))?,
        ),
        None => None,
    };

    let priority = match optional_str(obj, "priority")? {
        Some(raw) => raw
            .parse::<TaskPriority>()
            .map_err(|_| protocol_error(&format!("Unknown priority '{}'", raw)))?,
        None => TaskPriority::default(),
    };

    Ok(TaskDraft {
        title,
        description,
        due_date,
        priority,
    })
}

fn parse_event(obj: &Map<String, Value>, tz: &Tz) -> EventDraft {
    let text = |field: &str| obj.get(field).and_then(Value::as_str).filter(|s| !s.is_empty());
    let date = |field: &str| text(field).and_then(|raw| parse_flexible_datetime(raw, tz));

    EventDraft {
        title: text("title").or(text("summary")).map(str::to_string),
        description: text("description").map(str::to_string),
        start: date("start"),
        end: date("end"),
    }
}

fn parse_meta(obj: &Map<String, Value>) -> ResponseMeta {
    let missing = obj
        .get("missing")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ResponseMeta {
        missing,
        original_input: obj
            .get("originalInput")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        timestamp: obj.get("timestamp").and_then(Value::as_str).map(str::to_string),
    }
}
