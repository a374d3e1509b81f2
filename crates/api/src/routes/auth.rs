//! Authentication routes: register a company + admin user, log in.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use andino_core::auth::{hash_password, verify_password};
use andino_core::dian::{nit, only_digits};
use andino_db::entities::sea_orm_active_enums::UserRole;
use andino_db::{CompanyRepository, UserRepository};

use crate::routes::error_response;
use crate::AppState;

/// Creates the auth router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Request body for company + admin bootstrap.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Company name.
    pub company_name: String,
    /// Company NIT (with verification digit for juridical persons).
    pub nit: String,
    /// Admin email.
    pub email: String,
    /// Admin password (plaintext here only; stored as Argon2id).
    pub password: String,
    /// Admin full name.
    pub full_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// User slice returned to clients.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    /// User id.
    pub id: Uuid,
    /// Company id.
    pub company_id: Uuid,
    /// Email.
    pub email: String,
    /// Full name.
    pub full_name: String,
    /// Role.
    pub role: String,
}

/// POST /api/auth/register - create a company with its admin user.
///
/// The new company gets the billing and inventory modules enabled, matching
/// the default commercial bundle.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    if payload.company_name.is_empty()
        || payload.nit.is_empty()
        || payload.email.is_empty()
        || payload.password.len() < 8
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "company_name, nit, email y password (mínimo 8 caracteres) son obligatorios",
        );
    }

    // Juridical NITs carry their verification digit; validate it.
    if only_digits(&payload.nit).len() >= 10 {
        if let Err(e) = nit::validate_check_digit(&payload.nit) {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "FISCAL_INVALID", e.to_string());
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "password hashing failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "no se pudo registrar el usuario",
            );
        }
    };

    let company_repo = CompanyRepository::new((*state.db).clone());
    let company_id = Uuid::new_v4();
    let company = match company_repo
        .create(company_id, &payload.company_name, &payload.nit, None)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "company creation failed");
            return error_response(
                StatusCode::CONFLICT,
                "DUPLICATE",
                "la empresa (NIT) ya está registrada",
            );
        }
    };

    for module in ["billing", "inventory"] {
        if let Err(e) = company_repo.enable_module(company_id, module).await {
            error!(company_id = %company_id, module, error = %e, "module activation failed");
        }
    }

    let user_repo = UserRepository::new((*state.db).clone());
    let user = match user_repo
        .create(
            company_id,
            &payload.email,
            &password_hash,
            &payload.full_name,
            UserRole::Admin,
        )
        .await
    {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "user creation failed");
            return error_response(StatusCode::CONFLICT, "DUPLICATE", "el email ya está registrado");
        }
    };

    info!(company_id = %company.id, user_id = %user.id, "company registered");
    (
        StatusCode::CREATED,
        Json(json!({
            "company": { "id": company.id, "name": company.name, "nit": company.nit },
            "user": user_info(&user),
        })),
    )
        .into_response()
}

/// POST /api/auth/login - authenticate and return a token.
async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> impl IntoResponse {
    let user_repo = UserRepository::new((*state.db).clone());

    let user = match user_repo.find_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            info!(email = %payload.email, "login attempt for unknown user");
            return error_response(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "credenciales inválidas",
            );
        }
        Err(e) => {
            error!(error = %e, "database error during login");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "error durante el inicio de sesión",
            );
        }
    };

    if !user.is_active {
        return error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "cuenta deshabilitada");
    }

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            info!(user_id = %user.id, "failed login attempt");
            return error_response(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "credenciales inválidas",
            );
        }
        Err(e) => {
            error!(error = %e, "password verification error");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "error durante el inicio de sesión",
            );
        }
    }

    let token = match state
        .jwt_service
        .generate(user.id, user.company_id, user.role.as_str())
    {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "token generation failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "error durante el inicio de sesión",
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "token": token,
            "expires_in": state.jwt_service.expires_in(),
            "user": user_info(&user),
        })),
    )
        .into_response()
}

/// GET /api/auth/me - profile of the authenticated user (mounted behind the
/// auth middleware).
pub async fn me(State(state): State<AppState>, auth: crate::middleware::auth::AuthUser) -> impl IntoResponse {
    let user_repo = UserRepository::new((*state.db).clone());
    match user_repo.find_by_id(auth.user_id()).await {
        Ok(Some(user)) => (StatusCode::OK, Json(json!({ "user": user_info(&user) }))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "usuario no encontrado"),
        Err(e) => {
            error!(error = %e, "user lookup failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "error consultando el usuario",
            )
        }
    }
}

fn user_info(user: &andino_db::entities::users::Model) -> UserInfo {
    UserInfo {
        id: user.id,
        company_id: user.company_id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        role: user.role.as_str().to_string(),
    }
}
