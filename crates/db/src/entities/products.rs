//! `SeaORM` Entity for the products table.
//!
//! `cost` is the weighted-average cost derived from IN movements; product
//! CRUD never writes it — only the inventory engine and the re-averaging
//! trigger do.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    /// Unique per company.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Sale price.
    pub price: Decimal,
    /// Weighted-average cost, >= 0.
    pub cost: Decimal,
    /// IVA as a fraction: 0, 0.05 or 0.19.
    pub tax_rate: Decimal,
    /// DIAN unit code ("94" unit, "KGM" kilogram, ...).
    pub unit_measure: String,
    /// Free-form classification (UNSPSC).
    pub classification_code: Option<String>,
    /// Stock level that triggers replenishment.
    pub reorder_point: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Target stock after replenishment: 1.5× the reorder point.
    #[must_use]
    pub fn ideal_stock(&self) -> Decimal {
        self.reorder_point * Decimal::new(15, 1)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id"
    )]
    Companies,
    #[sea_orm(has_many = "super::stock::Entity")]
    Stock,
    #[sea_orm(has_many = "super::inventory_movements::Entity")]
    InventoryMovements,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl Related<super::inventory_movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
