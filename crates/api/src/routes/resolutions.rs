//! Billing-resolution routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use andino_db::repositories::resolution::CreateResolutionInput;
use andino_db::ResolutionRepository;
use andino_shared::auth::ROLE_ADMIN;

use crate::middleware::auth::AuthUser;
use crate::middleware::module::{ensure_module, MODULE_BILLING};
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the resolutions router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/resolutions", post(create_resolution).get(list_resolutions))
}

/// Request body for registering a resolution.
#[derive(Debug, Deserialize)]
pub struct CreateResolutionRequest {
    /// Resolution number as issued by DIAN.
    pub resolution_number: String,
    /// Authorized prefix.
    pub prefix: String,
    /// First authorized number.
    pub range_from: i64,
    /// Last authorized number.
    pub range_to: i64,
    /// Validity start (YYYY-MM-DD).
    pub date_from: NaiveDate,
    /// Validity end (YYYY-MM-DD).
    pub date_to: NaiveDate,
    /// Technical key (CUFE seed).
    pub technical_key: String,
    /// Whether this becomes the active resolution for the prefix.
    #[serde(default)]
    pub is_active: bool,
}

/// POST /api/resolutions - register a billing resolution.
async fn create_resolution(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateResolutionRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN]) {
        return resp;
    }
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    if payload.prefix.trim().is_empty() || payload.resolution_number.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "prefix y resolution_number son obligatorios",
        );
    }
    if payload.range_from > payload.range_to || payload.date_from > payload.date_to {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "rango o vigencia inválidos",
        );
    }

    let repo = ResolutionRepository::new((*state.db).clone());
    match repo
        .create(CreateResolutionInput {
            company_id: auth.company_id(),
            resolution_number: payload.resolution_number.trim().to_string(),
            prefix: payload.prefix.trim().to_string(),
            range_from: payload.range_from,
            range_to: payload.range_to,
            date_from: payload.date_from,
            date_to: payload.date_to,
            technical_key: payload.technical_key,
            is_active: payload.is_active,
        })
        .await
    {
        Ok(resolution) => (StatusCode::CREATED, Json(resolution)).into_response(),
        Err(e) => {
            error!(error = %e, "resolution creation failed");
            error_response(
                StatusCode::CONFLICT,
                "CONFLICT",
                "ya existe una resolución activa para este prefijo",
            )
        }
    }
}

/// GET /api/resolutions - list the company's resolutions.
async fn list_resolutions(State(state): State<AppState>, auth: AuthUser) -> Response {
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    let repo = ResolutionRepository::new((*state.db).clone());
    match repo.list_by_company(auth.company_id()).await {
        Ok(resolutions) => {
            (StatusCode::OK, Json(json!({ "resolutions": resolutions }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "resolution listing failed");
            internal_error("error consultando las resoluciones")
        }
    }
}
