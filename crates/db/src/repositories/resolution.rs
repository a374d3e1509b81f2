//! Billing-resolution repository.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::billing_resolutions;

/// Fields accepted when registering a resolution.
#[derive(Debug, Clone)]
pub struct CreateResolutionInput {
    /// Owning company.
    pub company_id: Uuid,
    /// Resolution number as issued by DIAN.
    pub resolution_number: String,
    /// Authorized prefix.
    pub prefix: String,
    /// First authorized number.
    pub range_from: i64,
    /// Last authorized number.
    pub range_to: i64,
    /// Validity start.
    pub date_from: NaiveDate,
    /// Validity end.
    pub date_to: NaiveDate,
    /// CUFE seed.
    pub technical_key: String,
    /// Whether this resolution is the active one for its prefix.
    pub is_active: bool,
}

/// Billing-resolution repository.
#[derive(Debug, Clone)]
pub struct ResolutionRepository {
    db: DatabaseConnection,
}

impl ResolutionRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a resolution. The partial unique index rejects a second
    /// active resolution for the same (company, prefix).
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn create(
        &self,
        input: CreateResolutionInput,
    ) -> Result<billing_resolutions::Model, DbErr> {
        let now = Utc::now().into();
        billing_resolutions::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(input.company_id),
            resolution_number: Set(input.resolution_number),
            prefix: Set(input.prefix),
            range_from: Set(input.range_from),
            range_to: Set(input.range_to),
            date_from: Set(input.date_from),
            date_to: Set(input.date_to),
            technical_key: Set(input.technical_key),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// The critical lookup of the DIAN flow: the single active resolution
    /// for (company, prefix) whose validity has not ended. Returns `None`
    /// without error when absent — the invoice is then built without the
    /// DIAN extension block.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn get_active_by_company_and_prefix(
        &self,
        company_id: Uuid,
        prefix: &str,
    ) -> Result<Option<billing_resolutions::Model>, DbErr> {
        let today = Utc::now().date_naive();
        billing_resolutions::Entity::find()
            .filter(billing_resolutions::Column::CompanyId.eq(company_id))
            .filter(billing_resolutions::Column::Prefix.eq(prefix))
            .filter(billing_resolutions::Column::IsActive.eq(true))
            .filter(billing_resolutions::Column::DateTo.gte(today))
            .order_by_desc(billing_resolutions::Column::DateFrom)
            .one(&self.db)
            .await
    }

    /// Lists the resolutions of a company, newest validity first.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn list_by_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<billing_resolutions::Model>, DbErr> {
        billing_resolutions::Entity::find()
            .filter(billing_resolutions::Column::CompanyId.eq(company_id))
            .order_by_desc(billing_resolutions::Column::DateFrom)
            .all(&self.db)
            .await
    }
}
