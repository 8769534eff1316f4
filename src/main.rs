//! Student portal - accounts, sessions and course enrollment over HTTP

use anyhow::Result;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_portal::{
    api::{self, AppState},
    config::Config,
    db,
    services::spawn_session_sweeper,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_portal=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting student portal...");

    // Load configuration
    let config_path = std::env::var("PORTAL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    config.validate()?;
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    if config.auth.uses_default_secret() {
        tracing::warn!("auth.jwt_secret is the built-in default; set PORTAL_AUTH_JWT_SECRET in production");
    }

    // Initialize database; keep serving on a lazy pool if it is down
    let pool = match db::create_pool(&config.database).await {
        Ok(pool) => {
            tracing::info!("Database connected: {:?}", config.database.driver);
            pool
        }
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed; continuing without it");
            db::create_lazy_pool(&config.database)?
        }
    };

    // Run migrations
    match db::migrations::run_migrations(&pool).await {
        Ok(applied) => tracing::info!(applied, "Database migrations completed"),
        Err(e) => tracing::error!(error = %e, "Database migrations failed"),
    }

    // Build application state
    let state = AppState::new(pool.clone(), &config);

    // Background session sweeper
    let shutdown = CancellationToken::new();
    let sweeper = spawn_session_sweeper(
        state.sessions.clone(),
        config.auth.sweep_interval(),
        shutdown.clone(),
    );

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Session sweeper did not stop cleanly");
    }
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C, cancelling background work as it does.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
