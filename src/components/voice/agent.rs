use super::protocol::{unwrap_envelope, VoiceAgentCredentials, VoiceAgentRequest, VoiceAgentResponse};
use crate::components::local_store::{keys, LocalStore};
use crate::error::{config_error, protocol_error, transport_error, validation_error, AppResult};
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Posts transcribed commands to the configured agent webhook
#[derive(Clone)]
pub struct VoiceAgentClient {
    store: Arc<LocalStore>,
    client: Client,
    tz: Tz,
}

impl VoiceAgentClient {
    pub fn new(store: Arc<LocalStore>, client: Client, tz: Tz) -> Self {
        Self { store, client, tz }
    }

    pub async fn credentials(&self) -> AppResult<Option<VoiceAgentCredentials>> {
        self.store.get_value(keys::VOICE_AGENT_CREDENTIALS).await
    }

    pub async fn set_credentials(&self, credentials: &VoiceAgentCredentials) -> AppResult<()> {
        self.store.set_value(keys::VOICE_AGENT_CREDENTIALS, credentials).await
    }

    /// Send `text` to the stored endpoint.
    ///
    /// Fails with `Config` before any network call when no endpoint is set.
    pub async fn send(&self, text: &str) -> AppResult<VoiceAgentResponse> {
        let credentials = self
            .credentials()
            .await?
            .filter(VoiceAgentCredentials::is_configured)
            .ok_or_else(|| config_error(&t!("agent_not_configured")))?;

        self.send_with(&credentials, &VoiceAgentRequest::new(text, Utc::now()))
            .await
    }

    pub async fn send_with(
        &self,
        credentials: &VoiceAgentCredentials,
        request: &VoiceAgentRequest,
    ) -> AppResult<VoiceAgentResponse> {
        let body = self.post(credentials, request).await?;
        VoiceAgentResponse::from_value(body, &self.tz)
    }

    /// POST the request and return the unwrapped, not yet validated body
    pub async fn post(&self, credentials: &VoiceAgentCredentials, request: &VoiceAgentRequest) -> AppResult<Value> {
        if !credentials.is_configured() {
            return Err(config_error(&t!("agent_not_configured")));
        }
        if request.text.trim().is_empty() {
            return Err(validation_error("Command text is empty"));
        }

        info!("Sending voice command to agent");
        debug!("Voice agent request: {:?}", request);

        let mut builder = self.client.post(&credentials.endpoint_url).json(request);
        if let Some(token) = credentials.bearer() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&format!("Request to voice agent failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(&format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| protocol_error(&format!("Voice agent returned invalid JSON: {}", e)))?;
        debug!("Voice agent response: {}", body);

        Ok(unwrap_envelope(body))
    }
}
