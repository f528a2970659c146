use miette::Diagnostic;
use thiserror::Error;

/// Every failure the service can report.
///
/// Config, Transport, Protocol and Validation decide how a voice command
/// failure is shown to the user; the rest are plumbing.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(agendavoz::environment))]
    Environment(String),

    /// Missing endpoint or credentials. Surfaced immediately, never retried.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(agendavoz::config))]
    Config(String),

    /// Network failure or non-2xx response. Surfaced with a retry action.
    #[error("Transport error: {0}")]
    #[diagnostic(code(agendavoz::transport))]
    Transport(String),

    /// Malformed agent response.
    #[error("Protocol error: {0}")]
    #[diagnostic(code(agendavoz::protocol))]
    Protocol(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(agendavoz::validation))]
    Validation(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(agendavoz::google_calendar))]
    GoogleCalendar(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(agendavoz::storage))]
    Storage(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(agendavoz::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(agendavoz::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(agendavoz::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(agendavoz::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type AppResult<T> = Result<T, Error>;

// Constructors taking borrowed messages, for use in `map_err` closures

pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

pub fn transport_error(message: &str) -> Error {
    Error::Transport(message.to_string())
}

pub fn protocol_error(message: &str) -> Error {
    Error::Protocol(message.to_string())
}

pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

pub fn storage_error(message: &str) -> Error {
    Error::Storage(message.to_string())
}

pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
