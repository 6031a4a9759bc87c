use std::sync::Arc;

use anyhow::Context;

use fitcoach_api::{
    config::Config,
    create_router,
    db::{self, PgStore},
    services::MollieClient,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitcoach_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);

    // Database
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let store = PgStore::new(pool);
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations applied");

    if config.mollie_api_key.is_empty() {
        tracing::warn!("MOLLIE_API_KEY not set, payment endpoints will return 503");
    }
    let provider = MollieClient::new(
        config.mollie_api_key.clone(),
        config.mollie_api_base.clone(),
        config.payment_timeout(),
    )
    .context("Failed to build payment provider client")?;

    let state = AppState::new(config.clone(), Arc::new(store), Arc::new(provider));
    let app = create_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
