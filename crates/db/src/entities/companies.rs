//! `SeaORM` Entity for the companies table (tenants).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Colombian NIT, with or without verification digit.
    pub nit: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// active, suspended, inactive.
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::users::Entity")]
    Users,
    #[sea_orm(has_many = "super::warehouses::Entity")]
    Warehouses,
    #[sea_orm(has_many = "super::products::Entity")]
    Products,
    #[sea_orm(has_many = "super::customers::Entity")]
    Customers,
    #[sea_orm(has_many = "super::invoices::Entity")]
    Invoices,
    #[sea_orm(has_many = "super::billing_resolutions::Entity")]
    BillingResolutions,
    #[sea_orm(has_many = "super::company_modules::Entity")]
    CompanyModules,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::warehouses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouses.def()
    }
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::billing_resolutions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingResolutions.def()
    }
}

impl Related<super::company_modules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompanyModules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
