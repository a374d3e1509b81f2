//! Warehouse routes (thin CRUD).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use andino_db::WarehouseRepository;
use andino_shared::auth::ROLE_ADMIN;

use crate::middleware::auth::AuthUser;
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the warehouse router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/warehouses", post(create_warehouse).get(list_warehouses))
}

/// Request body for warehouse creation.
#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    /// Display name.
    pub name: String,
    /// Optional address.
    #[serde(default)]
    pub address: Option<String>,
}

/// POST /api/warehouses - create a warehouse.
async fn create_warehouse(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateWarehouseRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN]) {
        return resp;
    }
    if payload.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "VALIDATION", "name es obligatorio");
    }

    let repo = WarehouseRepository::new((*state.db).clone());
    match repo
        .create(auth.company_id(), payload.name.trim(), payload.address)
        .await
    {
        Ok(warehouse) => (StatusCode::CREATED, Json(warehouse)).into_response(),
        Err(e) => {
            error!(error = %e, "warehouse creation failed");
            internal_error("error creando la bodega")
        }
    }
}

/// GET /api/warehouses - list the company's warehouses.
async fn list_warehouses(State(state): State<AppState>, auth: AuthUser) -> Response {
    let repo = WarehouseRepository::new((*state.db).clone());
    match repo.list_by_company(auth.company_id()).await {
        Ok(warehouses) => (StatusCode::OK, Json(json!({ "warehouses": warehouses }))).into_response(),
        Err(e) => {
            error!(error = %e, "warehouse listing failed");
            internal_error("error consultando las bodegas")
        }
    }
}
