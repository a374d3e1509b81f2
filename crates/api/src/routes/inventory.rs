//! Inventory routes: movement registration and replenishment suggestions.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use andino_db::entities::sea_orm_active_enums::MovementType;
use andino_db::repositories::{InventoryError, MovementInput};
use andino_db::{InventoryEngine, ProductRepository, WarehouseRepository};
use andino_shared::auth::{ROLE_ADMIN, ROLE_WAREHOUSE_OPERATOR};

use crate::middleware::auth::AuthUser;
use crate::middleware::module::{ensure_module, MODULE_INVENTORY};
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the inventory router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/movements", post(register_movement))
        .route("/inventory/replenishment", get(replenishment))
}

/// Request body for a movement.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    /// Product id.
    pub product_id: Uuid,
    /// Warehouse for IN / OUT / ADJUSTMENT.
    #[serde(default)]
    pub warehouse_id: Option<Uuid>,
    /// Source warehouse for TRANSFER.
    #[serde(default)]
    pub from_warehouse_id: Option<Uuid>,
    /// Destination warehouse for TRANSFER.
    #[serde(default)]
    pub to_warehouse_id: Option<Uuid>,
    /// IN | OUT | ADJUSTMENT | TRANSFER.
    pub movement_type: MovementType,
    /// Quantity; sign rules depend on the type.
    pub quantity: Decimal,
    /// Unit cost; mandatory for IN.
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
}

/// Replenishment suggestion for one product.
#[derive(Debug, Serialize)]
pub struct ReplenishmentSuggestion {
    /// Product id.
    pub product_id: Uuid,
    /// SKU.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Stock on hand across warehouses.
    pub on_hand: Decimal,
    /// Reorder point.
    pub reorder_point: Decimal,
    /// Suggested order: 1.5× reorder point minus on-hand.
    pub suggested_quantity: Decimal,
}

/// POST /api/inventory/movements - register IN/OUT/ADJUSTMENT/TRANSFER.
async fn register_movement(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<MovementRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN, ROLE_WAREHOUSE_OPERATOR]) {
        return resp;
    }
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_INVENTORY).await {
        return resp;
    }

    let company_id = auth.company_id();

    let product_repo = ProductRepository::new((*state.db).clone());
    let product = match product_repo.find_by_id(payload.product_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "producto no encontrado")
        }
        Err(e) => {
            error!(error = %e, "product lookup failed");
            return internal_error("error consultando el producto");
        }
    };
    if product.company_id != company_id {
        return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado al producto");
    }

    // Every referenced warehouse must exist and belong to the tenant.
    let warehouse_repo = WarehouseRepository::new((*state.db).clone());
    let referenced: Vec<Uuid> = [
        payload.warehouse_id,
        payload.from_warehouse_id,
        payload.to_warehouse_id,
    ]
    .into_iter()
    .flatten()
    .collect();
    for warehouse_id in referenced {
        match warehouse_repo.find_by_id(warehouse_id).await {
            Ok(Some(w)) if w.company_id == company_id => {}
            Ok(Some(_)) => {
                return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado a la bodega")
            }
            Ok(None) => {
                return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "bodega no encontrada")
            }
            Err(e) => {
                error!(error = %e, "warehouse lookup failed");
                return internal_error("error consultando la bodega");
            }
        }
    }

    let engine = InventoryEngine::new((*state.db).clone());
    match engine
        .register(MovementInput {
            user_id: auth.user_id(),
            product,
            warehouse_id: payload.warehouse_id,
            from_warehouse_id: payload.from_warehouse_id,
            to_warehouse_id: payload.to_warehouse_id,
            movement_type: payload.movement_type,
            quantity: payload.quantity,
            unit_cost: payload.unit_cost,
        })
        .await
    {
        Ok(transaction_id) => {
            info!(transaction_id = %transaction_id, "movement registered");
            (
                StatusCode::CREATED,
                Json(json!({ "transaction_id": transaction_id })),
            )
                .into_response()
        }
        Err(InventoryError::InvalidInput(msg)) => {
            error_response(StatusCode::BAD_REQUEST, "VALIDATION", msg)
        }
        Err(InventoryError::InsufficientStock(sku)) => error_response(
            StatusCode::CONFLICT,
            "INSUFFICIENT_STOCK",
            format!("stock insuficiente para SKU '{sku}'"),
        ),
        Err(InventoryError::Database(e)) => {
            error!(error = %e, "movement registration failed");
            internal_error("error registrando el movimiento")
        }
    }
}

/// GET /api/inventory/replenishment - products at or below their reorder
/// point with a suggested order quantity.
async fn replenishment(State(state): State<AppState>, auth: AuthUser) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN, ROLE_WAREHOUSE_OPERATOR]) {
        return resp;
    }
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_INVENTORY).await {
        return resp;
    }

    let repo = ProductRepository::new((*state.db).clone());
    match repo.replenishment_candidates(auth.company_id()).await {
        Ok(rows) => {
            let suggestions: Vec<ReplenishmentSuggestion> = rows
                .into_iter()
                .map(|row| {
                    let ideal = row.reorder_point * Decimal::new(15, 1);
                    ReplenishmentSuggestion {
                        product_id: row.id,
                        sku: row.sku,
                        name: row.name,
                        on_hand: row.on_hand,
                        reorder_point: row.reorder_point,
                        suggested_quantity: (ideal - row.on_hand).max(Decimal::ZERO),
                    }
                })
                .collect();
            (StatusCode::OK, Json(json!({ "suggestions": suggestions }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "replenishment query failed");
            internal_error("error consultando la reposición")
        }
    }
}
