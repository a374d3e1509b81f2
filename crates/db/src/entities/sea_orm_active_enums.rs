//! Postgres enum mappings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user inside its company.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access to the company.
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Inventory movements only.
    #[sea_orm(string_value = "warehouse_operator")]
    WarehouseOperator,
    /// Invoicing only.
    #[sea_orm(string_value = "salesperson")]
    Salesperson,
}

impl UserRole {
    /// Wire name of the role (JWT `role` claim).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::WarehouseOperator => "warehouse_operator",
            Self::Salesperson => "salesperson",
        }
    }

    /// Parses the wire name.
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "warehouse_operator" => Some(Self::WarehouseOperator),
            "salesperson" => Some(Self::Salesperson),
            _ => None,
        }
    }
}

/// Inventory movement kind.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "movement_type")]
pub enum MovementType {
    /// Entry; positive quantity, carries a unit cost.
    #[sea_orm(string_value = "IN")]
    #[serde(rename = "IN")]
    In,
    /// Exit; stored with negative quantity at the product's average cost.
    #[sea_orm(string_value = "OUT")]
    #[serde(rename = "OUT")]
    Out,
    /// Signed correction; routes through IN or OUT.
    #[sea_orm(string_value = "ADJUSTMENT")]
    #[serde(rename = "ADJUSTMENT")]
    Adjustment,
    /// Between warehouses; a paired ± row set sharing a transaction id.
    #[sea_orm(string_value = "TRANSFER")]
    #[serde(rename = "TRANSFER")]
    Transfer,
}

/// DIAN lifecycle status of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "dian_status")]
pub enum DianStatus {
    /// Persisted, number reserved, not yet signed.
    #[sea_orm(string_value = "DRAFT")]
    #[serde(rename = "DRAFT")]
    Draft,
    /// XML built and signed; QR available.
    #[sea_orm(string_value = "SIGNED")]
    #[serde(rename = "SIGNED")]
    Signed,
    /// Handed to the DIAN web service, response pending.
    #[sea_orm(string_value = "SUBMITTED")]
    #[serde(rename = "SUBMITTED")]
    Submitted,
    /// Accepted by DIAN.
    #[sea_orm(string_value = "ACCEPTED")]
    #[serde(rename = "ACCEPTED")]
    Accepted,
    /// Structured rejection from DIAN.
    #[sea_orm(string_value = "REJECTED")]
    #[serde(rename = "REJECTED")]
    Rejected,
    /// Build, signing, certificate, or transport failure. Terminal.
    #[sea_orm(string_value = "GENERATION_ERROR")]
    #[serde(rename = "GENERATION_ERROR")]
    GenerationError,
}

impl DianStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Signed => "SIGNED",
            Self::Submitted => "SUBMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::GenerationError => "GENERATION_ERROR",
        }
    }
}
