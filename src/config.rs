use crate::error::{env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Default locale for user-facing messages and speech recognition
pub const DEFAULT_LOCALE: &str = "pt-BR";

/// Default timezone for day/week grouping
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

const COMPONENTS_FILE: &str = "config/components.toml";

/// Which persistence backend the local store uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    File,
    Redis,
    Memory,
}

impl std::str::FromStr for StoreBackendKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            _ => Err(env_error("STORE_BACKEND")),
        }
    }
}

/// Main configuration structure for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Public origin of the service, used for the OAuth redirect URI
    pub public_origin: String,
    /// Directory for the file store backend
    pub data_dir: String,
    /// Store backend selection
    pub store_backend: StoreBackendKind,
    /// Redis URL when the redis backend is selected
    pub redis_url: String,
    /// Google OAuth client ID (seeded into the store when set)
    pub google_client_id: Option<String>,
    /// Google OAuth client secret (seeded into the store when set)
    pub google_client_secret: Option<String>,
    /// Google Calendar ID, `primary` when unset
    pub google_calendar_id: Option<String>,
    /// Voice agent webhook URL (seeded into the store when set)
    pub voice_agent_endpoint: Option<String>,
    /// Voice agent bearer token
    pub voice_agent_token: Option<String>,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
    /// Timezone for day/week grouping
    pub timezone: String,
    /// Locale for user-facing messages
    pub app_locale: String,
    /// Locale passed to speech recognizers
    pub speech_locale: String,
    /// Seconds between notification checks
    pub notification_check_interval: u64,
    /// Quiet period after capture ends before the transcript is processed
    pub speech_quiescence_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            public_origin: "http://localhost:3000".to_string(),
            data_dir: "./data".to_string(),
            store_backend: StoreBackendKind::File,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_calendar_id: None,
            voice_agent_endpoint: None,
            voice_agent_token: None,
            components: default_components(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            app_locale: DEFAULT_LOCALE.to_string(),
            speech_locale: DEFAULT_LOCALE.to_string(),
            notification_check_interval: 60,
            speech_quiescence_ms: 500,
        }
    }
}

fn default_components() -> HashMap<String, bool> {
    let mut components = HashMap::new();
    components.insert("google_calendar".to_string(), true);
    components.insert("voice_assistant".to_string(), true);
    components.insert("notifications".to_string(), true);
    components
}

/// Read an optional variable, treating blank values as unset
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match optional_var(name) {
        Some(raw) => raw.parse::<T>().map_err(|_| env_error(name)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let store_backend = match optional_var("STORE_BACKEND") {
            Some(raw) => raw.parse::<StoreBackendKind>()?,
            None => defaults.store_backend,
        };

        let timezone = optional_var("TIMEZONE").unwrap_or(defaults.timezone);
        timezone
            .parse::<Tz>()
            .map_err(|_| env_error("TIMEZONE"))?;

        let mut components = defaults.components;
        if let Ok(content) = fs::read_to_string(COMPONENTS_FILE) {
            if let Ok(file_components) = toml::from_str::<HashMap<String, bool>>(&content) {
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
        }

        Ok(Config {
            bind_address: optional_var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            public_origin: optional_var("PUBLIC_ORIGIN")
                .map(|o| o.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_origin),
            data_dir: optional_var("DATA_DIR").unwrap_or(defaults.data_dir),
            store_backend,
            redis_url: optional_var("REDIS_URL").unwrap_or(defaults.redis_url),
            google_client_id: optional_var("GOOGLE_CLIENT_ID"),
            google_client_secret: optional_var("GOOGLE_CLIENT_SECRET"),
            google_calendar_id: optional_var("GOOGLE_CALENDAR_ID"),
            voice_agent_endpoint: optional_var("VOICE_AGENT_ENDPOINT"),
            voice_agent_token: optional_var("VOICE_AGENT_TOKEN"),
            components,
            timezone,
            app_locale: optional_var("APP_LOCALE").unwrap_or(defaults.app_locale),
            speech_locale: optional_var("SPEECH_LOCALE").unwrap_or(defaults.speech_locale),
            notification_check_interval: parse_var(
                "NOTIFICATION_CHECK_INTERVAL",
                defaults.notification_check_interval,
            )?,
            speech_quiescence_ms: parse_var("SPEECH_QUIESCENCE_MS", defaults.speech_quiescence_ms)?,
        })
    }

    /// OAuth redirect URI, always `<origin>/auth`
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth", self.public_origin.trim_end_matches('/'))
    }

    /// Parsed timezone, UTC if the stored name is invalid
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or(Tz::UTC)
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }
}
