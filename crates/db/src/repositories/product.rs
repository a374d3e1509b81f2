//! Product repository.
//!
//! `cost` and `reorder_point` are owned by the inventory engine; plain CRUD
//! never mutates the cost.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, Set, Statement,
};
use uuid::Uuid;

use crate::entities::products;

/// Fields accepted when creating a product.
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    /// Owning company.
    pub company_id: Uuid,
    /// SKU, unique per company.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Optional free text.
    pub description: Option<String>,
    /// Sale price.
    pub price: Decimal,
    /// IVA as a fraction or percent (normalized by the caller).
    pub tax_rate: Decimal,
    /// DIAN unit code; empty defaults to "94".
    pub unit_measure: String,
    /// Optional UNSPSC classification.
    pub classification_code: Option<String>,
    /// Replenishment threshold.
    pub reorder_point: Decimal,
}

/// A product sitting at or below its reorder point.
#[derive(Debug, Clone, FromQueryResult)]
pub struct ReplenishmentRow {
    /// Product id.
    pub id: Uuid,
    /// SKU.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Replenishment threshold.
    pub reorder_point: Decimal,
    /// Stock summed across warehouses.
    pub on_hand: Decimal,
}

/// Product repository.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: DatabaseConnection,
}

impl ProductRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a product with zero cost; the inventory engine owns `cost`
    /// from then on.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure (including duplicate SKU).
    pub async fn create(&self, input: CreateProductInput) -> Result<products::Model, DbErr> {
        let now = Utc::now().into();
        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(input.company_id),
            sku: Set(input.sku),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            cost: Set(Decimal::ZERO),
            tax_rate: Set(input.tax_rate),
            unit_measure: Set(if input.unit_measure.is_empty() {
                "94".to_string()
            } else {
                input.unit_measure
            }),
            classification_code: Set(input.classification_code),
            reorder_point: Set(input.reorder_point),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Fetches a product by id.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<products::Model>, DbErr> {
        products::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists the products of a company.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn list_by_company(&self, company_id: Uuid) -> Result<Vec<products::Model>, DbErr> {
        products::Entity::find()
            .filter(products::Column::CompanyId.eq(company_id))
            .order_by_asc(products::Column::Sku)
            .all(&self.db)
            .await
    }

    /// Products whose total on-hand stock is at or below the reorder point.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn replenishment_candidates(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<ReplenishmentRow>, DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            SELECT p.id, p.sku, p.name, p.reorder_point,
                   COALESCE(SUM(s.quantity), 0) AS on_hand
              FROM products p
              LEFT JOIN stock s ON s.product_id = p.id
             WHERE p.company_id = $1
               AND p.reorder_point > 0
             GROUP BY p.id, p.sku, p.name, p.reorder_point
            HAVING COALESCE(SUM(s.quantity), 0) <= p.reorder_point
             ORDER BY p.sku
            ",
            [company_id.into()],
        );
        ReplenishmentRow::find_by_statement(stmt).all(&self.db).await
    }
}
