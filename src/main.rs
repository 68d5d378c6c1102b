//! loi-back binary entrypoint wiring the WebSocket lobby, presence ingestion,
//! league data refresh and the roll store.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loi_back::{
    config::{AppConfig, StorageBackend},
    dao::roll_store::MemoryRollStore,
    presence::PresenceSource,
    routes,
    services::{league_sync, lobby_service, presence_listener},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let app_state = AppState::new(config);

    start_storage(&app_state).await;

    let presence: Arc<dyn PresenceSource> = Arc::new(app_state.presence().clone());
    tokio::spawn(presence_listener::run(app_state.clone(), presence));
    tokio::spawn(lobby_service::run_roll_timer(app_state.clone()));

    match league_sync::LeagueDataClient::new(app_state.config().league.clone()) {
        Ok(client) => {
            tokio::spawn(league_sync::run(app_state.clone(), client));
        }
        Err(err) => error!(error = %err, "league data refresh disabled"),
    }

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured roll store. MongoDB is supervised in the background
/// so the lobby serves in degraded mode until it is reachable.
async fn start_storage(state: &SharedState) {
    match state.config().storage {
        StorageBackend::Memory => {
            info!("using in-memory roll store");
            state.set_roll_store(Arc::new(MemoryRollStore::new())).await;
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use loi_back::{
                dao::{
                    roll_store::{
                        RollStore,
                        mongodb::{MongoConfig, MongoRollStore},
                    },
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            let uri = state.config().mongo_uri.clone();
            let db_name = state.config().mongo_db.clone();
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    let store = MongoRollStore::connect(config).await?;
                    Ok::<Arc<dyn RollStore>, StorageError>(Arc::new(store))
                }
            }));
        }
        #[cfg(not(feature = "mongo-store"))]
        StorageBackend::Mongo => {
            error!("built without MongoDB support; falling back to the in-memory roll store");
            state.set_roll_store(Arc::new(MemoryRollStore::new())).await;
        }
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
                error!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
