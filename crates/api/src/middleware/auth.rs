//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use andino_shared::{Claims, JwtError};

use crate::AppState;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the JWT and stores the claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "code": "MISSING_TOKEN",
                "message": "se requiere Authorization: Bearer <token>"
            })),
        )
            .into_response();
    };

    match state.jwt_service.validate(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            let (code, message) = match e {
                JwtError::Expired => ("TOKEN_EXPIRED", "el token ha expirado"),
                _ => ("INVALID_TOKEN", "token inválido o mal formado"),
            };
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "code": code, "message": message })),
            )
                .into_response()
        }
    }
}

/// Extractor for the authenticated user's claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.0.user_id
    }

    /// Returns the company (tenant) ID from the claims.
    #[must_use]
    pub const fn company_id(&self) -> Uuid {
        self.0.company_id
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.0.role
    }

    /// Allows the request only for the listed roles.
    ///
    /// # Errors
    ///
    /// Returns a 403 response naming the required roles.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), Response> {
        if self.0.has_any_role(allowed) {
            return Ok(());
        }
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "code": "FORBIDDEN",
                "message": format!("acceso denegado: se requiere rol {}", allowed.join(" o "))
            })),
        )
            .into_response())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Claims>().cloned().map(AuthUser).ok_or((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "code": "UNAUTHORIZED",
                "message": "petición sin autenticar"
            })),
        ))
    }
}
