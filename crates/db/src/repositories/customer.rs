//! Customer repository.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::customers;

/// Customer repository.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: DatabaseConnection,
}

impl CustomerRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a customer.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn create(
        &self,
        company_id: Uuid,
        name: &str,
        tax_id: &str,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<customers::Model, DbErr> {
        let now = Utc::now().into();
        customers::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(name.to_string()),
            tax_id: Set(tax_id.to_string()),
            email: Set(email),
            phone: Set(phone),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Fetches a customer by id.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<customers::Model>, DbErr> {
        customers::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists the customers of a company.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn list_by_company(&self, company_id: Uuid) -> Result<Vec<customers::Model>, DbErr> {
        customers::Entity::find()
            .filter(customers::Column::CompanyId.eq(company_id))
            .order_by_asc(customers::Column::Name)
            .all(&self.db)
            .await
    }
}
