use agendavoz::components::google_calendar::{GoogleCalendar, GoogleCredentials};
use agendavoz::components::local_store::{keys, LocalStore, NewTask};
use agendavoz::components::notifications::Notifications;
use agendavoz::components::voice::{VoiceAgentCredentials, VoiceAssistant};
use agendavoz::components::{AppContext, Component, ComponentManager};
use agendavoz::config::{Config, StoreBackendKind};
use agendavoz::error::AppResult;
use agendavoz::startup::{build_app, seed_credentials};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

fn memory_config() -> Config {
    Config {
        store_backend: StoreBackendKind::Memory,
        ..Config::default()
    }
}

/// Smoke test to verify that the defaults are usable as-is
#[tokio::test]
async fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.bind_address, "0.0.0.0:3000");
    assert_eq!(config.redirect_uri(), "http://localhost:3000/auth");
    assert_eq!(config.tz(), chrono_tz::America::Sao_Paulo);
    assert_eq!(config.app_locale, "pt-BR");
}

/// Components are initialized in registration order and disabled ones are skipped
#[tokio::test]
async fn test_component_initialization_order() {
    struct Recorder {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Component for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &AppContext) -> AppResult<()> {
            self.order.lock().unwrap().push(self.name);
            Ok(())
        }

        async fn shutdown(&self) -> AppResult<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let mut config = memory_config();
    config.components.insert("first".to_string(), true);
    config.components.insert("second".to_string(), true);
    config.components.insert("disabled".to_string(), false);
    let config = Arc::new(RwLock::new(config));

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut manager = ComponentManager::new(Arc::clone(&config));
    for name in ["first", "disabled", "second", "unlisted"] {
        manager
            .register(Recorder {
                name,
                order: Arc::clone(&order),
            })
            .await;
    }
    assert_eq!(manager.len(), 2);

    let ctx = AppContext::new(config, Arc::new(LocalStore::in_memory()));
    manager.init_all(&ctx).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    assert!(manager.get_component_by_name("disabled").is_none());
    assert!(manager.get::<Recorder>().is_some());
}

#[tokio::test]
async fn test_build_app_wires_components() {
    let config = Arc::new(RwLock::new(memory_config()));
    let store = Arc::new(LocalStore::in_memory());

    let app = build_app(config, store).await.unwrap();
    assert_eq!(app.components.len(), 3);
    assert!(app.components.get::<GoogleCalendar>().is_some());
    assert!(app.components.get::<VoiceAssistant>().is_some());
    assert!(app.components.get::<Notifications>().is_some());
    assert!(app.state.calendar.is_some());
    assert!(app.state.voice.is_some());

    app.components.shutdown_all().await.unwrap();
    app.ctx.shutdown.cancel();
}

#[tokio::test]
async fn test_build_app_respects_disabled_components() {
    let mut config = memory_config();
    config.components.insert("google_calendar".to_string(), false);
    config.components.insert("voice_assistant".to_string(), false);
    let app = build_app(Arc::new(RwLock::new(config)), Arc::new(LocalStore::in_memory()))
        .await
        .unwrap();

    assert_eq!(app.components.len(), 1);
    assert!(app.state.calendar.is_none());
    assert!(app.state.voice.is_none());

    app.components.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_seed_credentials_keeps_stored_values() {
    let config = Config {
        google_client_id: Some("env-id".to_string()),
        google_client_secret: Some("env-secret".to_string()),
        voice_agent_endpoint: Some("https://agent.example/webhook".to_string()),
        voice_agent_token: Some("env-token".to_string()),
        ..memory_config()
    };
    let store = LocalStore::in_memory();
    let stored_agent = VoiceAgentCredentials {
        endpoint_url: "https://stored.example/hook".to_string(),
        auth_token: None,
    };
    store.set_value(keys::VOICE_AGENT_CREDENTIALS, &stored_agent).await.unwrap();

    seed_credentials(&config, &store).await.unwrap();

    let google: GoogleCredentials = store.get_value(keys::GOOGLE_CREDENTIALS).await.unwrap().unwrap();
    assert_eq!(google.client_id, "env-id");
    assert_eq!(google.redirect_uri, "http://localhost:3000/auth");
    let agent: VoiceAgentCredentials = store.get_value(keys::VOICE_AGENT_CREDENTIALS).await.unwrap().unwrap();
    assert_eq!(agent, stored_agent);
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        store_backend: StoreBackendKind::File,
        data_dir: dir.path().to_string_lossy().into_owned(),
        ..Config::default()
    };

    let store = LocalStore::open(&config).await.unwrap();
    let task = store
        .add_task(NewTask {
            title: "Persistir".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    drop(store);

    let reopened = LocalStore::open(&config).await.unwrap();
    assert_eq!(reopened.get_tasks().await.unwrap(), vec![task]);
}
