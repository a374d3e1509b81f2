//! `SeaORM` Entity for the billing_resolutions table.
//!
//! The DIAN authorization envelope. A partial unique index guarantees at
//! most one active resolution per (company, prefix).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "billing_resolutions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    /// Resolution number as issued (e.g. "18764000000001").
    pub resolution_number: String,
    pub prefix: String,
    pub range_from: i64,
    pub range_to: i64,
    pub date_from: Date,
    pub date_to: Date,
    /// Secret seed mixed into the CUFE. Never logged.
    #[serde(skip_serializing)]
    pub technical_key: String,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id"
    )]
    Companies,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
