use agendavoz::components::google_calendar::{
    CreatedEvent, GoogleCalendar, GoogleCalendarClient, GoogleCalendarHandle, GoogleCredentials, GoogleEndpoints,
    NewCalendarEvent,
};
use agendavoz::components::local_store::{keys, LocalStore};
use agendavoz::components::{AppContext, Component};
use agendavoz::config::Config;
use agendavoz::events::AppEvent;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENTS_PATH: &str = "/calendar/v3/calendars/primary/events";

fn endpoints(server: &MockServer) -> GoogleEndpoints {
    GoogleEndpoints {
        auth_url: format!("{}/o/oauth2/v2/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        api_base: format!("{}/calendar/v3", server.uri()),
    }
}

fn credentials() -> GoogleCredentials {
    GoogleCredentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "http://localhost:3000/auth".to_string(),
        calendar_id: None,
    }
}

/// Store with credentials and tokens, plus a handle pointed at the mock server
async fn connected_handle(server: &MockServer) -> (Arc<LocalStore>, GoogleCalendarHandle) {
    let store = Arc::new(LocalStore::in_memory());
    store.set_value(keys::GOOGLE_CREDENTIALS, &credentials()).await.unwrap();
    store.set_value(keys::GOOGLE_ACCESS_TOKEN, "old-token").await.unwrap();
    store.set_value(keys::GOOGLE_REFRESH_TOKEN, "refresh-token").await.unwrap();

    let client = GoogleCalendarClient::with_endpoints(Arc::clone(&store), reqwest::Client::new(), endpoints(server));
    (Arc::clone(&store), GoogleCalendarHandle::new(client, store))
}

fn event_list() -> serde_json::Value {
    json!({
        "items": [
            {
                "id": "evt1",
                "summary": "Reunião de equipe",
                "start": { "dateTime": "2025-06-18T10:00:00-03:00" },
                "end": { "dateTime": "2025-06-18T11:00:00-03:00" },
                "status": "confirmed"
            },
            {
                "id": "evt2",
                "start": { "date": "2025-06-20" },
                "end": { "date": "2025-06-21" }
            }
        ]
    })
}

fn new_event() -> NewCalendarEvent {
    let start = Utc.with_ymd_and_hms(2025, 6, 18, 17, 0, 0).unwrap();
    NewCalendarEvent {
        title: "Dentista".to_string(),
        description: None,
        start,
        end: start + Duration::hours(1),
        all_day: false,
        location: None,
        attendees: Vec::new(),
    }
}

#[tokio::test]
async fn test_get_events_parses_timed_and_all_day_events() {
    rust_i18n::set_locale("pt-BR");
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_list()))
        .expect(1)
        .mount(&server)
        .await;

    let (_, handle) = connected_handle(&server).await;
    let now = Utc::now();
    let events = handle.get_events(now, now + Duration::days(30)).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].title, "Reunião de equipe");
    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 6, 18, 13, 0, 0).unwrap());
    assert_eq!(events[0].all_day, Some(false));
    assert_eq!(events[1].title, "Evento sem título");
    assert_eq!(events[1].all_day, Some(true));
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-token",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_list()))
        .expect(1)
        .mount(&server)
        .await;

    let (store, handle) = connected_handle(&server).await;
    let now = Utc::now();
    let events = handle.get_events(now, now + Duration::days(1)).await.unwrap();
    assert_eq!(events.len(), 2);

    let stored: Option<String> = store.get_value(keys::GOOGLE_ACCESS_TOKEN).await.unwrap();
    assert_eq!(stored.as_deref(), Some("new-token"));
    // The refresh response carried no new refresh token, so the old one stays
    let refresh: Option<String> = store.get_value(keys::GOOGLE_REFRESH_TOKEN).await.unwrap();
    assert_eq!(refresh.as_deref(), Some("refresh-token"));
}

#[tokio::test]
async fn test_load_events_caches_then_falls_back() {
    let server = MockServer::start().await;
    let (store, handle) = connected_handle(&server).await;
    let now = Utc::now();

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_list()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let fresh = handle.load_events(now, now + Duration::days(30)).await.unwrap();
    assert_eq!(fresh.len(), 2);
    assert_eq!(store.get_cached_events().await.unwrap(), fresh);

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;
    assert!(handle.get_events(now, now + Duration::days(30)).await.is_err());
    let cached = handle.load_events(now, now + Duration::days(30)).await.unwrap();
    assert_eq!(cached, fresh);
}

#[tokio::test]
async fn test_load_events_without_credentials_uses_cache() {
    let server = MockServer::start().await;
    let store = Arc::new(LocalStore::in_memory());
    let client = GoogleCalendarClient::with_endpoints(Arc::clone(&store), reqwest::Client::new(), endpoints(&server));
    let handle = GoogleCalendarHandle::new(client, Arc::clone(&store));

    let cached = new_event().into_event("local_cached".to_string());
    store.save_cached_events(&[cached.clone()]).await.unwrap();

    assert!(!handle.has_valid_credentials().await.unwrap());
    let now = Utc::now();
    assert_eq!(handle.load_events(now, now + Duration::days(1)).await.unwrap(), vec![cached]);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_create_event_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(body_string_contains("Dentista"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "google_evt",
            "summary": "Dentista",
            "start": { "dateTime": "2025-06-18T17:00:00Z" },
            "end": { "dateTime": "2025-06-18T18:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (store, handle) = connected_handle(&server).await;
    let created = handle.create_event_with_fallback(new_event()).await.unwrap();

    assert!(matches!(&created, CreatedEvent::Remote(e) if e.id == "google_evt"));
    assert!(store.get_cached_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_event_refreshes_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-token",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer new-token"))
        .and(body_string_contains("Dentista"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "google_evt",
            "summary": "Dentista",
            "start": { "dateTime": "2025-06-18T17:00:00Z" },
            "end": { "dateTime": "2025-06-18T18:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (store, handle) = connected_handle(&server).await;
    let created = handle.create_event_with_fallback(new_event()).await.unwrap();

    assert!(matches!(&created, CreatedEvent::Remote(e) if e.id == "google_evt"));
    assert!(store.get_cached_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_event_falls_back_to_local_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (store, handle) = connected_handle(&server).await;
    let created = handle.create_event_with_fallback(new_event()).await.unwrap();

    match &created {
        CreatedEvent::Local { event, sync_failed } => {
            assert!(*sync_failed);
            assert!(event.id.starts_with("local_"));
            assert_eq!(event.title, "Dentista");
        }
        other => panic!("expected a local event, got {:?}", other),
    }
    assert_eq!(store.get_cached_events().await.unwrap(), vec![created.event().clone()]);
}

#[tokio::test]
async fn test_exchange_code_stores_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(LocalStore::in_memory());
    let client = GoogleCalendarClient::with_endpoints(Arc::clone(&store), reqwest::Client::new(), endpoints(&server));
    let handle = GoogleCalendarHandle::new(client, Arc::clone(&store));
    handle.set_credentials(credentials()).await.unwrap();

    let url = handle.auth_url().await.unwrap();
    assert!(url.starts_with(&server.uri()));
    assert!(url.contains("access_type=offline"));

    handle.exchange_code("abc123").await.unwrap();
    let access: Option<String> = store.get_value(keys::GOOGLE_ACCESS_TOKEN).await.unwrap();
    let refresh: Option<String> = store.get_value(keys::GOOGLE_REFRESH_TOKEN).await.unwrap();
    assert_eq!(access.as_deref(), Some("access"));
    assert_eq!(refresh.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn test_repeated_init_keeps_one_refresh_listener() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_list()))
        .mount(&server)
        .await;

    let store = Arc::new(LocalStore::in_memory());
    store.set_value(keys::GOOGLE_CREDENTIALS, &credentials()).await.unwrap();
    store.set_value(keys::GOOGLE_ACCESS_TOKEN, "old-token").await.unwrap();
    store.set_value(keys::GOOGLE_REFRESH_TOKEN, "refresh-token").await.unwrap();
    let ctx = AppContext::new(Arc::new(RwLock::new(Config::default())), Arc::clone(&store));

    let calendar = GoogleCalendar::with_endpoints(endpoints(&server));
    calendar.init(&ctx).await.unwrap();
    calendar.init(&ctx).await.unwrap();

    ctx.bus.publish(AppEvent::RefreshRequested);
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while store.get_cached_events().await.unwrap().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("refresh never reached the cache");
    // Give a second listener time to show up
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let fetches = server.received_requests().await.unwrap_or_default();
    assert_eq!(fetches.len(), 1);

    ctx.shutdown.cancel();
    calendar.shutdown().await.unwrap();
}
