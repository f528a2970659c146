use super::models::GoogleCredentials;
use crate::components::local_store::{keys, LocalStore};
use crate::error::{google_calendar_error, AppResult};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the OAuth access/refresh tokens, persisted in the local store
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<LocalStore>,
    client: Client,
    token_url: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl TokenManager {
    pub fn new(store: Arc<LocalStore>, client: Client, token_url: impl Into<String>) -> Self {
        Self {
            store,
            client,
            token_url: token_url.into(),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Current access token, loaded from the store on first use
    pub async fn access_token(&self) -> AppResult<Option<String>> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Ok(Some(token));
        }

        let stored: Option<String> = self.store.get_value(keys::GOOGLE_ACCESS_TOKEN).await?;
        if let Some(token) = &stored {
            *self.access_token.write().await = Some(token.clone());
        }
        Ok(stored)
    }

    /// Access token or a "Not authenticated" error
    pub async fn require_access_token(&self) -> AppResult<String> {
        self.access_token()
            .await?
            .ok_or_else(|| google_calendar_error("Not authenticated"))
    }

    /// Exchange an authorization code for tokens and persist them
    pub async fn exchange_code(&self, credentials: &GoogleCredentials, code: &str) -> AppResult<String> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ];

        let token = self.request_token(&params).await?;
        info!("Google Calendar authorization completed");
        Ok(token)
    }

    /// Forget both tokens, in memory and in the store
    pub async fn clear(&self) -> AppResult<()> {
        self.store.remove_value(keys::GOOGLE_ACCESS_TOKEN).await?;
        self.store.remove_value(keys::GOOGLE_REFRESH_TOKEN).await?;
        *self.access_token.write().await = None;
        Ok(())
    }

    /// Use the stored refresh token to obtain a new access token
    pub async fn refresh(&self, credentials: &GoogleCredentials) -> AppResult<String> {
        let refresh_token: String = self
            .store
            .get_value(keys::GOOGLE_REFRESH_TOKEN)
            .await?
            .ok_or_else(|| google_calendar_error("No refresh token stored"))?;

        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let token = self.request_token(&params).await?;
        info!("Google Calendar access token refreshed");
        Ok(token)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> AppResult<String> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Token request failed: HTTP {} - {}",
                status, error_body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse token response: {}", e)))?;

        let access_token = token
            .access_token
            .ok_or_else(|| google_calendar_error("Token response missing 'access_token' field"))?;
        debug!("Token expires in {:?}s", token.expires_in);

        self.store.set_value(keys::GOOGLE_ACCESS_TOKEN, &access_token).await?;
        if let Some(refresh_token) = &token.refresh_token {
            self.store.set_value(keys::GOOGLE_REFRESH_TOKEN, refresh_token).await?;
        }
        *self.access_token.write().await = Some(access_token.clone());

        Ok(access_token)
    }
}
