use crate::components::google_calendar::{GoogleCalendar, GoogleCredentials};
use crate::components::local_store::{keys, LocalStore};
use crate::components::notifications::Notifications;
use crate::components::voice::{RecognitionSettings, VoiceAgentClient, VoiceAgentCredentials, VoiceAssistant};
use crate::components::{AppContext, ComponentManager};
use crate::config::Config;
use crate::error::{AppResult, Error};
use crate::shutdown;
use crate::web::{self, AppState, ClientFeed};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn,tower_http=info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Copy credentials given in the environment into the store, without
/// overwriting anything saved there already
pub async fn seed_credentials(config: &Config, store: &LocalStore) -> AppResult<()> {
    if let (Some(client_id), Some(client_secret)) = (&config.google_client_id, &config.google_client_secret) {
        if store.get_value::<Value>(keys::GOOGLE_CREDENTIALS).await?.is_none() {
            let credentials = GoogleCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                redirect_uri: config.redirect_uri(),
                calendar_id: config.google_calendar_id.clone(),
            };
            store.set_value(keys::GOOGLE_CREDENTIALS, &credentials).await?;
            info!("Seeded Google credentials from environment");
        }
    }

    if let Some(endpoint_url) = &config.voice_agent_endpoint {
        if store.get_value::<Value>(keys::VOICE_AGENT_CREDENTIALS).await?.is_none() {
            let credentials = VoiceAgentCredentials {
                endpoint_url: endpoint_url.clone(),
                auth_token: config.voice_agent_token.clone(),
            };
            store.set_value(keys::VOICE_AGENT_CREDENTIALS, &credentials).await?;
            info!("Seeded voice agent endpoint from environment");
        }
    }

    Ok(())
}

/// Everything a running service holds on to
pub struct App {
    pub ctx: AppContext,
    pub components: Arc<ComponentManager>,
    pub state: AppState,
}

/// Register and initialize the components, then collect their handles into
/// the HTTP state
pub async fn build_app(config: Arc<RwLock<Config>>, store: Arc<LocalStore>) -> AppResult<App> {
    let ctx = AppContext::new(Arc::clone(&config), Arc::clone(&store));
    // Subscribed before the components start, so their first events are kept
    let feed = ClientFeed::new(&ctx.bus);

    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    component_manager.register(GoogleCalendar::new()).await;
    component_manager.register(VoiceAssistant::new()).await;
    component_manager.register(Notifications::new()).await;
    component_manager.init_all(&ctx).await?;

    let calendar = match component_manager.get::<GoogleCalendar>() {
        Some(component) => component.get_handle().await,
        None => None,
    };
    let voice = match component_manager.get::<VoiceAssistant>() {
        Some(component) => component.get_session().await,
        None => None,
    };

    let (tz, speech_locale) = {
        let config_read = config.read().await;
        (config_read.tz(), config_read.speech_locale.clone())
    };
    let state = AppState {
        store: Arc::clone(&store),
        tz,
        agent: VoiceAgentClient::new(Arc::clone(&store), ctx.http.clone(), tz),
        calendar,
        voice,
        feed,
        speech: RecognitionSettings::for_locale(speech_locale),
    };

    Ok(App {
        ctx,
        components: Arc::new(component_manager),
        state,
    })
}

/// Open the store, start the components and serve HTTP until shutdown
pub async fn start(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let bind_address = {
        let config_read = config.read().await;
        rust_i18n::set_locale(&config_read.app_locale);
        info!("Setting locale to {}", config_read.app_locale);
        config_read.bind_address.clone()
    };

    let store = {
        let config_read = config.read().await;
        let store = LocalStore::open(&config_read).await?;
        seed_credentials(&config_read, &store).await?;
        Arc::new(store)
    };

    let app = build_app(config, store).await?;

    let shutdown_token = app.ctx.shutdown.clone();
    let shutdown_components = Arc::clone(&app.components);
    tokio::spawn(shutdown::handle_signals(shutdown_components, shutdown_token.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| Error::Other(format!("Failed to bind {}: {}", bind_address, e)))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, web::router(app.state))
        .with_graceful_shutdown(shutdown_token.cancelled_owned())
        .await
        .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}
