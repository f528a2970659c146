//! One-off Google authorization for headless setups: opens the consent screen,
//! catches the `/auth` redirect on the public origin's port and stores the
//! resulting tokens.

use agendavoz::components::google_calendar::GoogleCalendarClient;
use agendavoz::components::local_store::LocalStore;
use agendavoz::config::Config;
use agendavoz::error::{config_error, other_error, AppResult};
use agendavoz::startup::seed_credentials;
use std::sync::Arc;
use url::Url;

#[tokio::main]
async fn main() -> miette::Result<()> {
    run().await?;
    Ok(())
}

async fn run() -> AppResult<()> {
    let config = Config::load()?;

    let store = LocalStore::open(&config).await?;
    seed_credentials(&config, &store).await?;
    let client = GoogleCalendarClient::new(Arc::new(store), reqwest::Client::new());

    let auth_url = client.auth_url().await?;

    let origin = Url::parse(&config.public_origin)
        .map_err(|e| config_error(&format!("Invalid PUBLIC_ORIGIN: {}", e)))?;
    let port = origin.port_or_known_default().unwrap_or(3000);

    println!("Opening browser for Google Calendar authorization...");
    if webbrowser::open(&auth_url).is_err() {
        println!("Open this URL manually:\n{}", auth_url);
    }

    let server = tiny_http::Server::http(("0.0.0.0", port))
        .map_err(|e| other_error(&format!("Failed to listen on port {}: {}", port, e)))?;
    println!("Waiting for authorization callback on port {}...", port);

    loop {
        let request = server.recv()?;
        let callback = Url::parse(&format!("http://localhost{}", request.url()))
            .map_err(|e| other_error(&format!("Invalid callback URL: {}", e)))?;

        if callback.path() != "/auth" {
            request.respond(tiny_http::Response::empty(404))?;
            continue;
        }

        let param = |name: &str| {
            callback
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            let message = format!("Falha na autorização: {}", error);
            request.respond(tiny_http::Response::from_string(message.clone()).with_status_code(400))?;
            return Err(other_error(&message));
        }

        let Some(code) = param("code") else {
            request.respond(
                tiny_http::Response::from_string("Nenhum código de autorização recebido").with_status_code(400),
            )?;
            continue;
        };

        return match client.exchange_code_for_token(&code).await {
            Ok(()) => {
                request.respond(tiny_http::Response::from_string(
                    "Conectado ao Google Calendar com sucesso! Você pode fechar esta janela.",
                ))?;
                println!("Tokens saved to the {:?} store", config.store_backend);
                Ok(())
            }
            Err(e) => {
                request.respond(
                    tiny_http::Response::from_string("Falha ao completar a autenticação. Tente novamente.")
                        .with_status_code(502),
                )?;
                Err(e)
            }
        };
    }
}
