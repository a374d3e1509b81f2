//! Product routes (thin CRUD; cost is owned by the inventory engine).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use andino_db::repositories::product::CreateProductInput;
use andino_db::ProductRepository;
use andino_shared::auth::ROLE_ADMIN;

use crate::middleware::auth::AuthUser;
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the product router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/{id}", get(get_product))
}

/// Request body for product creation.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    /// SKU, unique per company.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Sale price, >= 0.
    pub price: Decimal,
    /// IVA: 0, 5 or 19 (percent), or the equivalent fraction.
    pub tax_rate: Decimal,
    /// DIAN unit code; defaults to "94".
    #[serde(default)]
    pub unit_measure: String,
    /// Optional UNSPSC classification.
    #[serde(default)]
    pub classification_code: Option<String>,
    /// Replenishment threshold, >= 0.
    #[serde(default)]
    pub reorder_point: Decimal,
}

/// POST /api/products - create a product.
async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN]) {
        return resp;
    }
    if payload.sku.trim().is_empty() || payload.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "VALIDATION", "sku y name son obligatorios");
    }
    if payload.price < Decimal::ZERO || payload.reorder_point < Decimal::ZERO {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "price y reorder_point deben ser >= 0",
        );
    }

    // IVA Colombia: 0%, 5% o 19%.
    let rate = if payload.tax_rate > Decimal::ONE {
        payload.tax_rate / Decimal::from(100)
    } else {
        payload.tax_rate
    };
    let valid_rates = [Decimal::ZERO, Decimal::new(5, 2), Decimal::new(19, 2)];
    if !valid_rates.contains(&rate) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "tax_rate debe ser 0, 5 o 19",
        );
    }

    let repo = ProductRepository::new((*state.db).clone());
    match repo
        .create(CreateProductInput {
            company_id: auth.company_id(),
            sku: payload.sku.trim().to_string(),
            name: payload.name.trim().to_string(),
            description: payload.description,
            price: payload.price,
            tax_rate: rate,
            unit_measure: payload.unit_measure,
            classification_code: payload.classification_code,
            reorder_point: payload.reorder_point,
        })
        .await
    {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => {
            error!(error = %e, "product creation failed");
            error_response(StatusCode::CONFLICT, "DUPLICATE", "el SKU ya existe")
        }
    }
}

/// GET /api/products - list the company's products.
async fn list_products(State(state): State<AppState>, auth: AuthUser) -> Response {
    let repo = ProductRepository::new((*state.db).clone());
    match repo.list_by_company(auth.company_id()).await {
        Ok(products) => (StatusCode::OK, Json(json!({ "products": products }))).into_response(),
        Err(e) => {
            error!(error = %e, "product listing failed");
            internal_error("error consultando los productos")
        }
    }
}

/// GET /api/products/{id} - product detail.
async fn get_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Response {
    let repo = ProductRepository::new((*state.db).clone());
    match repo.find_by_id(id).await {
        Ok(Some(p)) if p.company_id == auth.company_id() => {
            (StatusCode::OK, Json(p)).into_response()
        }
        Ok(Some(_)) => error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado"),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "producto no encontrado"),
        Err(e) => {
            error!(error = %e, "product lookup failed");
            internal_error("error consultando el producto")
        }
    }
}
