use anyhow::{Context, Result};
use housed::api::{create_router, with_static_files, AppState};
use housed::auth::AccessGate;
use housed::backing;
use housed::config::HousedConfig;
use housed::mac::TargetMacs;
use housed::state::HouseStore;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "housed=info".into()),
        )
        .init();

    info!("housed starting...");

    let config = HousedConfig::load().context("Failed to load configuration")?;
    config.log_house_tables();

    // Backing store is optional; without it state lives only in memory
    let backing = backing::connect(&config.memcache).await;
    let store = Arc::new(HouseStore::load(backing, config.store_options()).await);
    info!(has_backing = store.has_backing(), "State store initialized");

    let gate = AccessGate::new(config.houses.api_keys.clone());
    if gate.configured_count() == 0 {
        warn!("No API keys configured, every request will be refused");
    } else {
        info!(houses = gate.configured_count(), "API keys loaded");
    }

    let state = AppState {
        store,
        gate: Arc::new(gate),
        target_macs: Arc::new(TargetMacs::new(config.houses.target_macs.clone())),
    };

    let router = with_static_files(create_router(state), &config.server.public_dir);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
