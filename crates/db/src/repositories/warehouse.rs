//! Warehouse repository.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::warehouses;

/// Warehouse repository.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    db: DatabaseConnection,
}

impl WarehouseRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a warehouse.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn create(
        &self,
        company_id: Uuid,
        name: &str,
        address: Option<String>,
    ) -> Result<warehouses::Model, DbErr> {
        let now = Utc::now().into();
        warehouses::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(name.to_string()),
            address: Set(address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Fetches a warehouse by id.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<warehouses::Model>, DbErr> {
        warehouses::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists the warehouses of a company.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn list_by_company(&self, company_id: Uuid) -> Result<Vec<warehouses::Model>, DbErr> {
        warehouses::Entity::find()
            .filter(warehouses::Column::CompanyId.eq(company_id))
            .order_by_asc(warehouses::Column::Name)
            .all(&self.db)
            .await
    }
}
