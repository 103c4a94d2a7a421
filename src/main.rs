use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aws_clients;
mod catalog;
mod config;
mod directory;
mod domain;
mod errors;
mod handlers;
mod local;
mod models;
mod routes;
mod startup;
mod storage;
mod store;

use crate::config::Config;
use crate::errors::AppError;
use crate::store::{SaveOutcome, StoreFacade};

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub store: StoreFacade,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "emm_store=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Config::load()?;
    tracing::info!(bind_address = %config.bind_address, backends = ?config.backends, "Configuration loaded");

    // --- Store ---
    let backends = startup::build_backends(&config).await;
    if backends.is_empty() {
        return Err(AppError::InitError("no snapshot backend configured".to_string()));
    }
    let store = StoreFacade::new(backends, config.default_admin_password.clone());
    watch_saves(&store);
    // Serve the built-in snapshot right away; the loaded one replaces it when ready.
    let _ = store.spawn_initialize();

    let state = Arc::new(AppState { store });
    let app = routes::create_router(state);

    // --- Server Startup ---
    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Logs saves that did not reach durable storage.
fn watch_saves(store: &StoreFacade) {
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let SaveOutcome::Failed(reason) = &event.outcome {
                        tracing::warn!(
                            backend = ?event.backend,
                            version = event.version,
                            %reason,
                            "Persistence degraded: latest change is held in memory only"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Save event watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
