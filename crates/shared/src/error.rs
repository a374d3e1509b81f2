//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Domain-level error kinds shared by every layer.
///
/// Repository adapters map driver errors into these kinds; the HTTP layer
/// maps each kind onto a fixed status code and a stable wire code, so the
/// JSON body is always `{ "code": ..., "message": ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource does not exist.
    #[error("recurso no encontrado: {0}")]
    NotFound(String),

    /// Request payload failed validation.
    #[error("entrada inválida: {0}")]
    InvalidInput(String),

    /// Unique-constraint violation (e.g. invoice number already taken).
    #[error("recurso duplicado: {0}")]
    Duplicate(String),

    /// Missing or invalid credentials.
    #[error("no autorizado: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (wrong tenant, role, or module).
    #[error("acceso denegado: {0}")]
    Forbidden(String),

    /// Request conflicts with current state.
    #[error("conflicto con el estado actual: {0}")]
    Conflict(String),

    /// Not enough stock to cover a requested OUT. Carries the offending SKU.
    #[error("stock insuficiente para SKU '{0}'")]
    InsufficientStock(String),

    /// Document fails DIAN fiscal rules (NIT check digit, totals mismatch).
    #[error("documento fiscal inválido: {0}")]
    FiscalInvalid(String),

    /// Infrastructure failure (database, filesystem, network).
    #[error("error interno: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Duplicate(_) | Self::Conflict(_) | Self::InsufficientStock(_) => 409,
            Self::FiscalInvalid(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the stable wire code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "VALIDATION",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::FiscalInvalid(_) => "FISCAL_INVALID",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
