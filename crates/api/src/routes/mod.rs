//! API route definitions.

pub mod auth;
pub mod customers;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod products;
pub mod resolutions;
pub mod warehouses;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Builds the standard `{code, message}` error response.
pub(crate) fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(json!({ "code": code, "message": message.into() })),
    )
        .into_response()
}

/// Shorthand for a 500 with a logged-elsewhere message.
pub(crate) fn internal_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
}
