//! SaaS module gating.
//!
//! Billing and inventory endpoints only run for companies with the module
//! contracted, active and unexpired. Infrastructure failures answer 503 so
//! a database hiccup is distinguishable from "not contracted".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use andino_db::CompanyRepository;

use crate::AppState;

/// Billing module name.
pub const MODULE_BILLING: &str = "billing";
/// Inventory module name.
pub const MODULE_INVENTORY: &str = "inventory";

/// Allows the request only when the company has the module active.
///
/// # Errors
///
/// 403 `MODULE_DISABLED` when the module is not contracted or expired;
/// 503 `MODULE_CHECK_FAILED` when the lookup itself fails.
pub async fn ensure_module(
    state: &AppState,
    company_id: Uuid,
    module_name: &str,
) -> Result<(), Response> {
    let repo = CompanyRepository::new((*state.db).clone());
    match repo.has_active_module(company_id, module_name).await {
        Ok(true) => Ok(()),
        Ok(false) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "code": "MODULE_DISABLED",
                "message": format!("el módulo '{module_name}' no está activo para esta empresa")
            })),
        )
            .into_response()),
        Err(e) => {
            error!(company_id = %company_id, module = module_name, error = %e, "module check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "code": "MODULE_CHECK_FAILED",
                    "message": "no se pudo verificar el módulo, intente más tarde"
                })),
            )
                .into_response())
        }
    }
}

/// Same check without turning "inactive" into a response: the invoice
/// intake uses it to decide whether stock must be deducted.
///
/// # Errors
///
/// 503 `MODULE_CHECK_FAILED` when the lookup fails.
pub async fn module_is_active(
    state: &AppState,
    company_id: Uuid,
    module_name: &str,
) -> Result<bool, Response> {
    let repo = CompanyRepository::new((*state.db).clone());
    repo.has_active_module(company_id, module_name)
        .await
        .map_err(|e| {
            error!(company_id = %company_id, module = module_name, error = %e, "module check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "code": "MODULE_CHECK_FAILED",
                    "message": "no se pudo verificar el módulo, intente más tarde"
                })),
            )
                .into_response()
        })
}
