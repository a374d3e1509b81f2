//! Transactional inventory engine.
//!
//! Every mutation runs inside one database transaction and row-locks the
//! target stock row (`SELECT … FOR UPDATE`) before touching it, so
//! concurrent OUTs against the same (product, warehouse) serialize and the
//! non-negative stock invariant holds under load. When several rows are
//! involved (TRANSFER) locks are acquired in ascending (product, warehouse)
//! order.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QuerySelect, TransactionTrait,
};
use thiserror::Error;
use uuid::Uuid;

use andino_core::inventory::weighted_average_cost;

use crate::entities::{
    inventory_movements, products, sea_orm_active_enums::MovementType, stock,
};

/// Inventory engine errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Movement request failed validation.
    #[error("entrada inválida: {0}")]
    InvalidInput(String),

    /// Not enough stock to cover the requested quantity.
    #[error("stock insuficiente para SKU '{0}'")]
    InsufficientStock(String),

    /// Database error.
    #[error("error de base de datos: {0}")]
    Database(#[from] DbErr),
}

/// A validated movement request. The caller has already resolved the
/// product and checked tenancy; the engine enforces the per-type rules.
#[derive(Debug, Clone)]
pub struct MovementInput {
    /// Author of the movement.
    pub user_id: Uuid,
    /// Target product (caller-verified to belong to the tenant).
    pub product: products::Model,
    /// Warehouse for IN / OUT / ADJUSTMENT.
    pub warehouse_id: Option<Uuid>,
    /// Source warehouse for TRANSFER.
    pub from_warehouse_id: Option<Uuid>,
    /// Destination warehouse for TRANSFER.
    pub to_warehouse_id: Option<Uuid>,
    /// Movement kind.
    pub movement_type: MovementType,
    /// Quantity; sign rules depend on the kind.
    pub quantity: Decimal,
    /// Unit cost; mandatory for IN, defaulted to zero for positive
    /// adjustments.
    pub unit_cost: Option<Decimal>,
}

/// Transactional inventory engine.
#[derive(Debug, Clone)]
pub struct InventoryEngine {
    db: DatabaseConnection,
}

impl InventoryEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Registers a movement inside its own transaction. Commit on success,
    /// rollback on any error. Returns the transaction id grouping the
    /// movement rows.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidInput`] for malformed requests,
    /// [`InventoryError::InsufficientStock`] when an OUT (or the source of
    /// a TRANSFER) is not covered, and database errors otherwise.
    pub async fn register(&self, input: MovementInput) -> Result<Uuid, InventoryError> {
        validate(&input)?;

        let transaction_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        match input.movement_type {
            MovementType::In => {
                let warehouse_id = input.warehouse_id.unwrap_or_default();
                let unit_cost = input.unit_cost.unwrap_or_default();
                apply_in(
                    &txn,
                    &input.product,
                    warehouse_id,
                    input.quantity,
                    unit_cost,
                    input.user_id,
                    transaction_id,
                )
                .await?;
            }
            MovementType::Out => {
                let warehouse_id = input.warehouse_id.unwrap_or_default();
                apply_out(
                    &txn,
                    &input.product,
                    warehouse_id,
                    input.quantity,
                    input.user_id,
                    transaction_id,
                )
                .await?;
            }
            MovementType::Adjustment => {
                let warehouse_id = input.warehouse_id.unwrap_or_default();
                if input.quantity > Decimal::ZERO {
                    apply_in(
                        &txn,
                        &input.product,
                        warehouse_id,
                        input.quantity,
                        input.unit_cost.unwrap_or(Decimal::ZERO),
                        input.user_id,
                        transaction_id,
                    )
                    .await?;
                } else {
                    apply_out(
                        &txn,
                        &input.product,
                        warehouse_id,
                        -input.quantity,
                        input.user_id,
                        transaction_id,
                    )
                    .await?;
                }
            }
            MovementType::Transfer => {
                apply_transfer(
                    &txn,
                    &input.product,
                    input.from_warehouse_id.unwrap_or_default(),
                    input.to_warehouse_id.unwrap_or_default(),
                    input.quantity,
                    input.user_id,
                    transaction_id,
                )
                .await?;
            }
        }

        txn.commit().await?;
        Ok(transaction_id)
    }

    /// OUT against a caller-owned transaction. The invoice pipeline passes
    /// the invoice id as `transaction_id` so movements stay joinable to the
    /// invoice that caused them.
    ///
    /// # Errors
    ///
    /// Same semantics as a standalone OUT.
    pub async fn out_in_txn(
        txn: &DatabaseTransaction,
        product: &products::Model,
        warehouse_id: Uuid,
        user_id: Uuid,
        quantity: Decimal,
        transaction_id: Uuid,
    ) -> Result<(), InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidInput(
                "la cantidad de salida debe ser positiva".into(),
            ));
        }
        apply_out(txn, product, warehouse_id, quantity, user_id, transaction_id).await
    }
}

fn validate(input: &MovementInput) -> Result<(), InventoryError> {
    let invalid = |msg: &str| Err(InventoryError::InvalidInput(msg.to_string()));

    match input.movement_type {
        MovementType::In | MovementType::Out | MovementType::Adjustment => {
            if input.warehouse_id.is_none() {
                return invalid("warehouse_id es obligatorio");
            }
            if input.quantity.is_zero() {
                return invalid("la cantidad no puede ser cero");
            }
            if input.movement_type == MovementType::In {
                match input.unit_cost {
                    Some(c) if c >= Decimal::ZERO => {}
                    _ => return invalid("unit_cost es obligatorio (>= 0) para entradas"),
                }
                if input.quantity < Decimal::ZERO {
                    return invalid("la cantidad de entrada debe ser positiva");
                }
            }
            if input.movement_type == MovementType::Out && input.quantity < Decimal::ZERO {
                return invalid("la cantidad de salida debe ser positiva");
            }
        }
        MovementType::Transfer => {
            let (Some(from), Some(to)) = (input.from_warehouse_id, input.to_warehouse_id) else {
                return invalid("from_warehouse_id y to_warehouse_id son obligatorios");
            };
            if from == to {
                return invalid("las bodegas de origen y destino deben ser distintas");
            }
            if input.quantity <= Decimal::ZERO {
                return invalid("la cantidad a trasladar debe ser positiva");
            }
        }
    }
    Ok(())
}

/// Locks the stock row and returns its quantity; a missing row reads as
/// zero (rows are created lazily on first movement).
async fn lock_stock(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Decimal, DbErr> {
    let row = stock::Entity::find_by_id((product_id, warehouse_id))
        .lock_exclusive()
        .one(txn)
        .await?;
    Ok(row.map_or(Decimal::ZERO, |s| s.quantity))
}

async fn save_stock(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: Decimal,
) -> Result<(), DbErr> {
    use sea_orm::Set;

    let row = stock::ActiveModel {
        product_id: Set(product_id),
        warehouse_id: Set(warehouse_id),
        quantity: Set(quantity),
        updated_at: Set(Utc::now().into()),
    };
    stock::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([stock::Column::ProductId, stock::Column::WarehouseId])
                .update_columns([stock::Column::Quantity, stock::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(txn)
        .await?;
    Ok(())
}

async fn update_product_cost(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    cost: Decimal,
) -> Result<(), DbErr> {
    products::Entity::update_many()
        .col_expr(products::Column::Cost, Expr::value(cost))
        .col_expr(
            products::Column::UpdatedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(products::Column::Id.eq(product_id))
        .exec(txn)
        .await?;
    Ok(())
}

struct MovementRow {
    transaction_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    movement_type: MovementType,
    quantity: Decimal,
    unit_cost: Decimal,
    created_by: Uuid,
}

async fn insert_movement(txn: &DatabaseTransaction, row: MovementRow) -> Result<(), DbErr> {
    use sea_orm::Set;

    let now = Utc::now().into();
    inventory_movements::ActiveModel {
        id: Set(Uuid::new_v4()),
        transaction_id: Set(row.transaction_id),
        product_id: Set(row.product_id),
        warehouse_id: Set(row.warehouse_id),
        movement_type: Set(row.movement_type),
        quantity: Set(row.quantity),
        unit_cost: Set(row.unit_cost),
        total_cost: Set(row.quantity * row.unit_cost),
        moved_at: Set(now),
        created_by: Set(row.created_by),
        created_at: Set(now),
    }
    .insert(txn)
    .await?;
    Ok(())
}

/// IN: lock the row, recompute the weighted-average cost, raise stock,
/// append the movement. The AFTER-INSERT trigger then re-averages over the
/// full IN history (4 dp), which is the idempotent authority the
/// incremental update must converge with.
async fn apply_in(
    txn: &DatabaseTransaction,
    product: &products::Model,
    warehouse_id: Uuid,
    quantity: Decimal,
    unit_cost: Decimal,
    user_id: Uuid,
    transaction_id: Uuid,
) -> Result<(), InventoryError> {
    let current = lock_stock(txn, product.id, warehouse_id).await?;

    let new_cost = weighted_average_cost(current, product.cost, quantity, unit_cost)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    update_product_cost(txn, product.id, new_cost).await?;

    save_stock(txn, product.id, warehouse_id, current + quantity).await?;

    insert_movement(
        txn,
        MovementRow {
            transaction_id,
            product_id: product.id,
            warehouse_id,
            movement_type: MovementType::In,
            quantity,
            unit_cost,
            created_by: user_id,
        },
    )
    .await?;
    Ok(())
}

/// OUT: lock the row, require coverage, lower stock, append the movement at
/// the current average cost (negative quantity).
async fn apply_out(
    txn: &DatabaseTransaction,
    product: &products::Model,
    warehouse_id: Uuid,
    quantity: Decimal,
    user_id: Uuid,
    transaction_id: Uuid,
) -> Result<(), InventoryError> {
    let current = lock_stock(txn, product.id, warehouse_id).await?;
    if current < quantity {
        return Err(InventoryError::InsufficientStock(product.sku.clone()));
    }

    save_stock(txn, product.id, warehouse_id, current - quantity).await?;

    insert_movement(
        txn,
        MovementRow {
            transaction_id,
            product_id: product.id,
            warehouse_id,
            movement_type: MovementType::Out,
            quantity: -quantity,
            unit_cost: product.cost,
            created_by: user_id,
        },
    )
    .await?;
    Ok(())
}

/// TRANSFER: lock both rows in ascending warehouse order, require coverage
/// at the source, move the quantity, append a ± pair sharing the
/// transaction id at the current product cost.
async fn apply_transfer(
    txn: &DatabaseTransaction,
    product: &products::Model,
    from_warehouse_id: Uuid,
    to_warehouse_id: Uuid,
    quantity: Decimal,
    user_id: Uuid,
    transaction_id: Uuid,
) -> Result<(), InventoryError> {
    // Total lock order avoids AB/BA deadlocks between concurrent transfers.
    let (first, second) = if from_warehouse_id < to_warehouse_id {
        (from_warehouse_id, to_warehouse_id)
    } else {
        (to_warehouse_id, from_warehouse_id)
    };
    let first_qty = lock_stock(txn, product.id, first).await?;
    let second_qty = lock_stock(txn, product.id, second).await?;

    let (origin_qty, dest_qty) = if first == from_warehouse_id {
        (first_qty, second_qty)
    } else {
        (second_qty, first_qty)
    };

    if origin_qty < quantity {
        return Err(InventoryError::InsufficientStock(product.sku.clone()));
    }

    save_stock(txn, product.id, from_warehouse_id, origin_qty - quantity).await?;
    save_stock(txn, product.id, to_warehouse_id, dest_qty + quantity).await?;

    insert_movement(
        txn,
        MovementRow {
            transaction_id,
            product_id: product.id,
            warehouse_id: from_warehouse_id,
            movement_type: MovementType::Transfer,
            quantity: -quantity,
            unit_cost: product.cost,
            created_by: user_id,
        },
    )
    .await?;
    insert_movement(
        txn,
        MovementRow {
            transaction_id,
            product_id: product.id,
            warehouse_id: to_warehouse_id,
            movement_type: MovementType::Transfer,
            quantity,
            unit_cost: product.cost,
            created_by: user_id,
        },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input(movement_type: MovementType) -> MovementInput {
        MovementInput {
            user_id: Uuid::new_v4(),
            product: products::Model {
                id: Uuid::new_v4(),
                company_id: Uuid::new_v4(),
                sku: "SKU-1".to_string(),
                name: "Producto".to_string(),
                description: None,
                price: Decimal::new(1000, 2),
                cost: Decimal::ZERO,
                tax_rate: Decimal::new(19, 2),
                unit_measure: "94".to_string(),
                classification_code: None,
                reorder_point: Decimal::ZERO,
                created_at: Utc::now().into(),
                updated_at: Utc::now().into(),
            },
            warehouse_id: Some(Uuid::new_v4()),
            from_warehouse_id: None,
            to_warehouse_id: None,
            movement_type,
            quantity: Decimal::ONE,
            unit_cost: Some(Decimal::ONE),
        }
    }

    #[test]
    fn in_requires_unit_cost() {
        let mut input = base_input(MovementType::In);
        input.unit_cost = None;
        assert!(matches!(
            validate(&input),
            Err(InventoryError::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut input = base_input(MovementType::Out);
        input.quantity = Decimal::ZERO;
        assert!(validate(&input).is_err());
    }

    #[test]
    fn transfer_requires_distinct_warehouses() {
        let mut input = base_input(MovementType::Transfer);
        let wh = Uuid::new_v4();
        input.from_warehouse_id = Some(wh);
        input.to_warehouse_id = Some(wh);
        assert!(validate(&input).is_err());
    }

    #[test]
    fn negative_adjustment_is_valid() {
        let mut input = base_input(MovementType::Adjustment);
        input.quantity = Decimal::NEGATIVE_ONE;
        input.unit_cost = None;
        assert!(validate(&input).is_ok());
    }
}
