//! Company repository: tenant rows and SaaS module gating.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::{companies, company_modules};

/// Company repository.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    db: DatabaseConnection,
}

impl CompanyRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a company.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn create(
        &self,
        id: Uuid,
        name: &str,
        nit: &str,
        address: Option<String>,
    ) -> Result<companies::Model, DbErr> {
        let now = Utc::now().into();
        companies::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            nit: Set(nit.to_string()),
            address: Set(address),
            phone: Set(None),
            email: Set(None),
            status: Set("active".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Fetches a company by id.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<companies::Model>, DbErr> {
        companies::Entity::find_by_id(id).one(&self.db).await
    }

    /// Reports whether the company has `module_name` contracted, active and
    /// not expired. Infrastructure failures surface as `Err`; a missing
    /// module row is simply `false`.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn has_active_module(
        &self,
        company_id: Uuid,
        module_name: &str,
    ) -> Result<bool, DbErr> {
        let today = Utc::now().date_naive();
        let count = company_modules::Entity::find()
            .filter(company_modules::Column::CompanyId.eq(company_id))
            .filter(company_modules::Column::ModuleName.eq(module_name))
            .filter(company_modules::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(company_modules::Column::ExpiresAt.is_null())
                    .add(company_modules::Column::ExpiresAt.gte(today)),
            )
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// Activates a module for the company (idempotent upsert).
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn enable_module(&self, company_id: Uuid, module_name: &str) -> Result<(), DbErr> {
        use sea_orm::sea_query::OnConflict;

        let row = company_modules::ActiveModel {
            company_id: Set(company_id),
            module_name: Set(module_name.to_string()),
            active: Set(true),
            expires_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        company_modules::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    company_modules::Column::CompanyId,
                    company_modules::Column::ModuleName,
                ])
                .update_columns([
                    company_modules::Column::Active,
                    company_modules::Column::ExpiresAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
