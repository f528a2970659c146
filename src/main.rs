use agendavoz::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting agendavoz");

    // Load configuration
    let config = startup::load_config().await?;

    // Serve until a shutdown signal arrives
    startup::start(config).await
}
