mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod odk;
mod services;
mod storage;
#[cfg(test)]
mod test_support;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::odk::{BlobLocator, PgRemoteExecutor};
use crate::services::{MediaSyncService, OdkSyncService};
use crate::storage::LocalMirror;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub media_sync: Arc<MediaSyncService>,
    pub odk_sync: Arc<OdkSyncService>,
    /// Held for the duration of a fleet run
    pub fleet_lock: Arc<Mutex<()>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinovara_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PINOVARA ODK sync...");

    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let executor = Arc::new(PgRemoteExecutor::new(&config.odk));
    let locator = BlobLocator::new(db.clone(), executor.clone(), &config.odk.profile);
    let mirror = Arc::new(LocalMirror::new(&config.mirror));
    let media_sync = Arc::new(MediaSyncService::new(db.clone(), locator, mirror));
    let odk_sync = Arc::new(OdkSyncService::new(db.clone(), media_sync.clone()));

    let state = AppState {
        config: config.clone(),
        media_sync,
        odk_sync,
        fleet_lock: Arc::new(Mutex::new(())),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    executor.close().await;
    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected_routes = Router::new()
        // Per-organization sync
        .route("/organizacoes/:id/fotos/sync", post(handlers::media::sync_photos))
        .route(
            "/organizacoes/:id/fotos/odk-disponiveis",
            get(handlers::media::available_photos),
        )
        .route("/organizacoes/:id/arquivos/sync", post(handlers::media::sync_files))
        .route(
            "/organizacoes/:id/arquivos/odk-disponiveis",
            get(handlers::media::available_files),
        )
        // Admin
        .route("/admin/odk/sync-all", post(handlers::admin::sync_all))
        .route("/admin/odk/stats", get(handlers::admin::stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
