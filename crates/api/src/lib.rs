//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes
//! - Authentication, role and module-gating middleware
//! - The background DIAN orchestrator dispatched after invoice creation

pub mod middleware;
pub mod orchestrator;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use andino_shared::{DianConfig, JwtService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service.
    pub jwt_service: Arc<JwtService>,
    /// DIAN configuration (technical key, environment, certificate paths).
    pub dian: Arc<DianConfig>,
    /// Directory with the PDF fonts.
    pub fonts_dir: String,
}

/// Creates the main application router.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", axum::routing::get(routes::auth::me))
        .merge(routes::invoices::routes())
        .merge(routes::inventory::routes())
        .merge(routes::products::routes())
        .merge(routes::warehouses::routes())
        .merge(routes::customers::routes())
        .merge(routes::resolutions::routes())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(routes::health::routes())
                .merge(routes::auth::routes())
                .merge(protected),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
