//! Authentication claim types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role names as they travel in the JWT `role` claim.
pub const ROLE_ADMIN: &str = "admin";
/// Warehouse operator: inventory movements only.
pub const ROLE_WAREHOUSE_OPERATOR: &str = "warehouse_operator";
/// Salesperson: invoicing only.
pub const ROLE_SALESPERSON: &str = "salesperson";

/// JWT claims: the registered set plus tenant context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Issuer.
    pub iss: String,
    /// Issued-at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// User ID (duplicated from `sub` for clients that read it by name).
    pub user_id: Uuid,
    /// Company (tenant) the token is scoped to.
    pub company_id: Uuid,
    /// Role of the user inside the company.
    pub role: String,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        company_id: Uuid,
        role: &str,
        issuer: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            user_id,
            company_id,
            role: role.to_string(),
        }
    }

    /// Returns true if the claim carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns true if the role is one of `allowed`.
    #[must_use]
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|r| self.role == *r)
    }
}
