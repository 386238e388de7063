use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use assistant_relay::{
    config::AppConfig,
    routes,
    services::openai::OpenAiAssistant,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,assistant_relay=debug")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {e}");
            std::process::exit(1);
        }
    };
    info!(?config, "loaded configuration");

    probe_document(&config.document_path).await;

    let assistant =
        OpenAiAssistant::from_config(&config).context("failed to build assistant client")?;
    let state: SharedState = Arc::new(AppState::new(&config, Arc::new(assistant)));

    spawn_rate_limit_purge(state.clone());

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server running on port {}", config.port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

/// The bundled document is only checked for presence; nothing reads it.
async fn probe_document(path: &Path) {
    match tokio::fs::try_exists(path).await {
        Ok(true) => info!("File exists: {}", path.display()),
        Ok(false) => warn!("File does not exist: {}", path.display()),
        Err(e) => warn!("Could not check {}: {e}", path.display()),
    }
}

fn spawn_rate_limit_purge(state: SharedState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.rate_limiter.window());
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = state.rate_limiter.purge_idle().await;
            let tracked = state.rate_limiter.len().await;
            debug!(removed, tracked, "purged idle rate limit entries");
        }
    });
}
