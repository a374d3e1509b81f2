//! `SeaORM` Entity for the invoices table.
//!
//! `(company_id, prefix, number)` is unique; `uuid` mirrors `cufe` once the
//! orchestrator has signed the document.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::DianStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    /// Optional sales channel; NULL collapses to the "direct" bucket.
    pub channel_id: Option<Uuid>,
    pub prefix: String,
    pub number: String,
    pub issue_date: DateTimeWithTimeZone,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub dian_status: DianStatus,
    /// SHA-384 fingerprint, 96 hex chars, set after signing.
    pub cufe: Option<String>,
    /// Same value as `cufe`; travels in `<cbc:UUID>`.
    pub uuid: Option<String>,
    /// Signed XML document.
    pub xml_signed: Option<String>,
    /// QR payload string.
    pub qr_data: Option<String>,
    /// ZipKey returned by the DIAN web service.
    pub track_id: Option<String>,
    /// Rejection/error messages from DIAN, joined with "; ".
    pub dian_errors: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customers,
    #[sea_orm(
        belongs_to = "super::sales_channels::Entity",
        from = "Column::ChannelId",
        to = "super::sales_channels::Column::Id"
    )]
    SalesChannels,
    #[sea_orm(has_many = "super::invoice_lines::Entity")]
    InvoiceLines,
}

impl Related<super::invoice_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceLines.def()
    }
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::sales_channels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesChannels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
