use image_describer::{
    app_state::AppState,
    config::AppConfig,
    db::{self, store::PgRecordStore},
    services::{caption::WorkersAiClient, fetcher::HttpFetcher, reconcile::ReconciliationLoop},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting image description worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL and applying migrations");
    let db_pool = db::connect(&config.database_url)
        .await
        .expect("Failed to connect to database and apply migrations");

    // Initialize services
    tracing::info!(model = %config.caption_model, "Initializing services");
    let fetcher = HttpFetcher::new(config.fetch_timeout())
        .expect("Failed to initialize HTTP fetcher")
        .with_max_body_bytes(config.fetch_max_bytes);

    let describer = WorkersAiClient::new(
        &config.cf_account_id,
        &config.cf_api_token,
        &config.caption_model,
        config.inference_timeout(),
    )
    .expect("Failed to initialize Workers AI client");

    let state = AppState::new(PgRecordStore::new(db_pool), fetcher, describer);

    tracing::info!("Worker ready, starting reconciliation loop");

    ReconciliationLoop::new(&state, config.loop_settings())
        .run()
        .await;
}
