use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qrcraft::{
    api::{self, AppState},
    config::ServerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // -----------------------------
    // Config / shared state
    // -----------------------------
    let config = ServerConfig::from_env()?;
    if config.api_token.is_none() {
        warn!("REPLICATE_API_TOKEN is not set; /api/generate will answer 500 until it is");
    }
    match config.poll.timeout {
        Some(limit) => info!(timeout_secs = limit.as_secs(), "prediction wait is bounded"),
        None => warn!("QRCRAFT_POLL_TIMEOUT_SECS=0; predictions are awaited without a limit"),
    }

    let addr = config.bind.clone();
    let app = api::router(AppState::new(config));

    info!("HTTP listening on http://{addr}");
    info!("Generate API at http://{addr}/api/generate");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
