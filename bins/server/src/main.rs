//! Andino API server.
//!
//! Main entry point for the inventory + electronic-billing backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use andino_api::{create_router, AppState};
use andino_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "andino=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = andino_db::connect(&config.database.url, config.database.max_connections).await?;
    info!("Connected to database");

    // Create JWT service
    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        expiration_minutes: config.jwt.expiration_minutes,
        issuer: config.jwt.issuer.clone(),
    });

    if config.dian.technical_key.is_empty() {
        info!("DIAN technical key not configured; invoices will stay in DRAFT");
    } else {
        info!(app_env = %config.dian.app_env, "DIAN orchestration enabled");
    }

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        dian: Arc::new(config.dian.clone()),
        fonts_dir: std::env::var("FONTS_DIR").unwrap_or_else(|_| "./fonts".to_string()),
    };

    // Create router
    let app = create_router(state);

    // Start server with graceful shutdown: in-flight requests get up to
    // 10 s to drain; background orchestrations are not awaited.
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; draining in-flight requests");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(10), server).await {
        Ok(joined) => joined??,
        Err(_) => info!("Drain budget exhausted; exiting"),
    }

    Ok(())
}
