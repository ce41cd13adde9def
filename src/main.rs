//! photo-reveal-back binary entrypoint wiring REST, SSE and the storage backends.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use photo_reveal_back::{
    config::{AppConfig, StoreBackend},
    dao::{
        game_store::{GameStore, local::LocalGameStore},
        storage::StorageError,
    },
    routes,
    services::{progress, storage_supervisor},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = StoreBackend::from_env();
    info!(backend = backend.label(), "selected storage backend");

    let app_state = AppState::new(config);
    spawn_storage(app_state.clone(), backend)?;
    tokio::spawn(observe_progress(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the selected backend. The server keeps answering
/// in degraded mode until the first connection succeeds.
fn spawn_storage(state: SharedState, backend: StoreBackend) -> anyhow::Result<()> {
    let game_id = state.config().game_id.clone();

    match backend {
        #[cfg(feature = "couch-store")]
        StoreBackend::Couch => {
            use photo_reveal_back::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            let couch_config = CouchConfig::from_env().context("reading CouchDB settings")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch_config = couch_config.clone();
                let game_id = game_id.clone();
                async move {
                    let store = CouchGameStore::connect(couch_config, &game_id).await?;
                    Ok::<Arc<dyn GameStore>, StorageError>(Arc::new(store))
                }
            }));
        }
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => {
            use photo_reveal_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            tokio::spawn(storage_supervisor::run(state, move || {
                let game_id = game_id.clone();
                async move {
                    let mongo_config = MongoConfig::from_env().await?;
                    let store = MongoGameStore::connect(mongo_config, &game_id).await?;
                    Ok::<Arc<dyn GameStore>, StorageError>(Arc::new(store))
                }
            }));
        }
        #[allow(unreachable_patterns)]
        StoreBackend::Couch | StoreBackend::Mongo => {
            anyhow::bail!(
                "{} backend requested but this build does not include it",
                backend.label()
            );
        }
        StoreBackend::Local => {
            let data_dir = state.config().data_dir.clone();
            tokio::spawn(storage_supervisor::run(state, move || {
                let data_dir = data_dir.clone();
                async move {
                    let store = LocalGameStore::open(&data_dir).await?;
                    info!(path = %store.path().display(), "using local game file");
                    Ok::<Arc<dyn GameStore>, StorageError>(Arc::new(store))
                }
            }));
        }
    }

    Ok(())
}

/// Log reveal progress for as long as the process runs. The observer is
/// re-registered whenever storage comes back after an outage.
async fn observe_progress(state: SharedState) {
    let mut degraded = state.degraded_watcher();

    loop {
        if degraded.wait_for(|value| !*value).await.is_err() {
            return;
        }

        let handle = match progress::watch_progress(state.store()).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "progress observer could not subscribe");
                if degraded.changed().await.is_err() {
                    return;
                }
                continue;
            }
        };

        if degraded.wait_for(|value| *value).await.is_err() {
            return;
        }
        handle.unsubscribe();
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
