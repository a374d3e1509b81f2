//! Customer routes (thin CRUD).

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

use andino_core::dian::{nit, only_digits};
use andino_db::CustomerRepository;
use andino_shared::auth::{ROLE_ADMIN, ROLE_SALESPERSON};

use crate::middleware::auth::AuthUser;
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the customer router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/customers", post(create_customer).get(list_customers))
}

/// Request body for customer creation.
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    /// Display name.
    pub name: String,
    /// NIT (with verification digit) or cédula.
    pub tax_id: String,
    /// Optional email.
    #[serde(default)]
    pub email: Option<String>,
    /// Optional phone.
    #[serde(default)]
    pub phone: Option<String>,
}

/// POST /api/customers - create a customer. Juridical NITs (10+ digits)
/// must carry a valid verification digit.
async fn create_customer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN, ROLE_SALESPERSON]) {
        return resp;
    }
    if payload.name.trim().is_empty() || payload.tax_id.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "name y tax_id son obligatorios",
        );
    }
    if only_digits(&payload.tax_id).len() >= 10 {
        if let Err(e) = nit::validate_check_digit(&payload.tax_id) {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "FISCAL_INVALID", e.to_string());
        }
    }

    let repo = CustomerRepository::new((*state.db).clone());
    match repo
        .create(
            auth.company_id(),
            payload.name.trim(),
            payload.tax_id.trim(),
            payload.email,
            payload.phone,
        )
        .await
    {
        Ok(customer) => (StatusCode::CREATED, Json(customer)).into_response(),
        Err(e) => {
            error!(error = %e, "customer creation failed");
            internal_error("error creando el cliente")
        }
    }
}

/// GET /api/customers - list the company's customers.
async fn list_customers(State(state): State<AppState>, auth: AuthUser) -> Response {
    let repo = CustomerRepository::new((*state.db).clone());
    match repo.list_by_company(auth.company_id()).await {
        Ok(customers) => (StatusCode::OK, Json(json!({ "customers": customers }))).into_response(),
        Err(e) => {
            error!(error = %e, "customer listing failed");
            internal_error("error consultando los clientes")
        }
    }
}
