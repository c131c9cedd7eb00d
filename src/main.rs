//! Golden Ticket engine entrypoint wiring the local store, the remote API
//! client, and the sign-in synchronization flow.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use golden_ticket::config::AppConfig;
use golden_ticket::dao::store::Store;
use golden_ticket::remote::HttpApi;
use golden_ticket::services::sync;
use golden_ticket::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let store = open_store(&config).await?;
    store
        .seed_game_rules(config.games().to_vec())
        .await
        .context("seeding game rules")?;

    let api = Arc::new(HttpApi::new(&config.api_base_url, config.request_timeout())?);
    let state = AppState::new(config, store.clone(), api);

    // Credentials from the environment start a session straight away; without
    // them the engine idles until an embedding caller signs in.
    match (
        env::var("GOLDEN_TICKET_USERNAME"),
        env::var("GOLDEN_TICKET_PASSWORD"),
    ) {
        (Ok(username), Ok(password)) => {
            if let Err(err) = sync::sign_in(&state, &username, &password).await {
                warn!(error = %err, "initial sign-in failed");
            }
        }
        _ => info!("no credentials in the environment; waiting for sign-in"),
    }

    shutdown_signal().await;
    info!("shutting down");

    sync::sign_out(&state).await;
    store.close().await.context("closing store")?;
    Ok(())
}

#[cfg(feature = "sqlite-store")]
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    use golden_ticket::dao::store::sqlite::SqliteStore;

    let store = SqliteStore::open(&config.database_path)
        .await
        .context("opening sqlite store")?;
    info!(path = %config.database_path, "opened sqlite store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite-store"))]
async fn open_store(_config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    use golden_ticket::dao::store::memory::MemoryStore;

    warn!("sqlite backend disabled; caches will not survive a restart");
    Ok(Arc::new(MemoryStore::new()))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
