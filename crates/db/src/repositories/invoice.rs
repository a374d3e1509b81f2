//! Invoice repository: draft creation (atomically with stock deduction) and
//! the DIAN lifecycle updates the orchestrator persists.

use chrono::Local;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, Statement,
    TransactionTrait,
};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{
    invoice_lines, invoices, products, sea_orm_active_enums::DianStatus,
};
use crate::repositories::inventory::{InventoryEngine, InventoryError};

/// Invoice repository errors.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// (company, prefix, number) already taken.
    #[error("ya existe una factura {0} para la empresa")]
    Duplicate(String),

    /// Request failed validation.
    #[error("entrada inválida: {0}")]
    InvalidInput(String),

    /// Not enough stock for one of the lines.
    #[error("stock insuficiente para SKU '{0}'")]
    InsufficientStock(String),

    /// Database error.
    #[error("error de base de datos: {0}")]
    Database(#[from] DbErr),
}

impl From<InventoryError> for InvoiceError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::InsufficientStock(sku) => Self::InsufficientStock(sku),
            InventoryError::InvalidInput(msg) => Self::InvalidInput(msg),
            InventoryError::Database(err) => Self::Database(err),
        }
    }
}

/// One requested line, with the product already resolved and tenant-checked
/// by the caller. `unit_price` is final (zero has been defaulted to the
/// product price upstream).
#[derive(Debug, Clone)]
pub struct InvoiceLineInput {
    /// Product being sold.
    pub product: products::Model,
    /// Quantity, > 0.
    pub quantity: Decimal,
    /// Unit price, >= 0.
    pub unit_price: Decimal,
}

/// Draft-creation request.
#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    /// Tenant.
    pub company_id: Uuid,
    /// Customer (tenant-checked by the caller).
    pub customer_id: Uuid,
    /// Author; also recorded on the stock movements.
    pub user_id: Uuid,
    /// Present when the inventory module is active: stock is deducted from
    /// this warehouse in the same transaction.
    pub warehouse_id: Option<Uuid>,
    /// Invoice prefix.
    pub prefix: String,
    /// Invoice number; `None` derives `{prefix}-{unix}`.
    pub number: Option<String>,
    /// Optional sales channel.
    pub channel_id: Option<Uuid>,
    /// Lines, non-empty.
    pub lines: Vec<InvoiceLineInput>,
}

/// Light row for the polling endpoint.
#[derive(Debug, Clone, FromQueryResult)]
pub struct DianStatusRow {
    /// Invoice id.
    pub id: Uuid,
    /// Tenant, for the ownership check.
    pub company_id: Uuid,
    /// Lifecycle status.
    pub dian_status: DianStatus,
    /// CUFE, when signed.
    pub cufe: Option<String>,
    /// DIAN tracking id, when submitted.
    pub track_id: Option<String>,
    /// DIAN errors, when rejected or failed.
    pub dian_errors: Option<String>,
}

/// Targeted update of the DIAN lifecycle columns. `None` fields never erase
/// existing values (COALESCE), so the orchestrator can persist partial
/// progress idempotently.
#[derive(Debug, Clone, Default)]
pub struct DianUpdate {
    /// New fingerprint.
    pub cufe: Option<String>,
    /// New UUID (same value as the CUFE).
    pub uuid: Option<String>,
    /// Signed XML.
    pub xml_signed: Option<String>,
    /// QR payload.
    pub qr_data: Option<String>,
    /// Tracking id from the web service.
    pub track_id: Option<String>,
    /// Error messages from the web service.
    pub dian_errors: Option<String>,
}

/// Invoice repository.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    db: DatabaseConnection,
}

impl InvoiceRepository {
    /// Creates the repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the DRAFT header and its lines, deducting stock per line in
    /// the same transaction when a warehouse is given. Commit-or-rollback
    /// on every path; an insufficient-stock error rolls everything back.
    ///
    /// # Errors
    ///
    /// [`InvoiceError::Duplicate`] when (company, prefix, number) is taken,
    /// [`InvoiceError::InsufficientStock`] when a line is not covered,
    /// database errors otherwise.
    pub async fn create_draft(
        &self,
        input: CreateInvoiceInput,
    ) -> Result<(invoices::Model, Vec<invoice_lines::Model>), InvoiceError> {
        if input.lines.is_empty() {
            return Err(InvoiceError::InvalidInput(
                "la factura debe tener al menos una línea".into(),
            ));
        }

        // Issue timestamp in the process time zone (Colombia in production).
        let now = Local::now().fixed_offset();
        let invoice_id = Uuid::new_v4();
        let number = input
            .number
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}-{}", input.prefix, now.timestamp()));

        // Totals derived from the lines; tax rounded to 2 decimals.
        let mut net_total = Decimal::ZERO;
        let mut tax_total = Decimal::ZERO;
        for line in &input.lines {
            let subtotal = line.quantity * line.unit_price;
            net_total += subtotal;
            tax_total += subtotal * normalize_rate(line.product.tax_rate);
        }
        let tax_total = tax_total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let grand_total = net_total + tax_total;

        let txn = self.db.begin().await?;

        // Stock first: the row locks serialize concurrent sales and any
        // shortage aborts before the header exists.
        if let Some(warehouse_id) = input.warehouse_id {
            for line in &input.lines {
                InventoryEngine::out_in_txn(
                    &txn,
                    &line.product,
                    warehouse_id,
                    input.user_id,
                    line.quantity,
                    invoice_id,
                )
                .await?;
            }
        }

        let header = invoices::ActiveModel {
            id: Set(invoice_id),
            company_id: Set(input.company_id),
            customer_id: Set(input.customer_id),
            channel_id: Set(input.channel_id),
            prefix: Set(input.prefix.clone()),
            number: Set(number.clone()),
            issue_date: Set(now),
            net_total: Set(net_total),
            tax_total: Set(tax_total),
            grand_total: Set(grand_total),
            dian_status: Set(DianStatus::Draft),
            cufe: Set(None),
            uuid: Set(None),
            xml_signed: Set(None),
            qr_data: Set(None),
            track_id: Set(None),
            dian_errors: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let header = header.insert(&txn).await.map_err(|e| {
            if is_unique_violation(&e) {
                InvoiceError::Duplicate(format!("{}{number}", input.prefix))
            } else {
                InvoiceError::Database(e)
            }
        })?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let subtotal = line.quantity * line.unit_price;
            let model = invoice_lines::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(invoice_id),
                product_id: Set(line.product.id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                tax_rate: Set(normalize_rate(line.product.tax_rate)),
                subtotal: Set(subtotal),
            };
            lines.push(model.insert(&txn).await?);
        }

        txn.commit().await?;
        Ok((header, lines))
    }

    /// Fetches an invoice by id.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<invoices::Model>, DbErr> {
        invoices::Entity::find_by_id(id).one(&self.db).await
    }

    /// Fetches the lines of an invoice, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn lines_of(&self, invoice_id: Uuid) -> Result<Vec<invoice_lines::Model>, DbErr> {
        invoice_lines::Entity::find()
            .filter(invoice_lines::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_lines::Column::Id)
            .all(&self.db)
            .await
    }

    /// Light read for the polling endpoint: lifecycle columns only.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn get_dian_status(&self, id: Uuid) -> Result<Option<DianStatusRow>, DbErr> {
        invoices::Entity::find_by_id(id)
            .select_only()
            .columns([
                invoices::Column::Id,
                invoices::Column::CompanyId,
                invoices::Column::DianStatus,
                invoices::Column::Cufe,
                invoices::Column::TrackId,
                invoices::Column::DianErrors,
            ])
            .into_model::<DianStatusRow>()
            .one(&self.db)
            .await
    }

    /// Persists orchestrator progress: the status plus whichever lifecycle
    /// columns the update carries. Every value column goes through COALESCE
    /// so `None` never erases earlier progress.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn update_dian(
        &self,
        id: Uuid,
        status: DianStatus,
        update: DianUpdate,
    ) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            UPDATE invoices
               SET cufe        = COALESCE($2, cufe),
                   uuid        = COALESCE($3, uuid),
                   xml_signed  = COALESCE($4, xml_signed),
                   qr_data     = COALESCE($5, qr_data),
                   track_id    = COALESCE($6, track_id),
                   dian_errors = COALESCE($7, dian_errors),
                   dian_status = CAST($8 AS dian_status),
                   updated_at  = now()
             WHERE id = $1
            ",
            [
                id.into(),
                update.cufe.into(),
                update.uuid.into(),
                update.xml_signed.into(),
                update.qr_data.into(),
                update.track_id.into(),
                update.dian_errors.into(),
                status.as_str().into(),
            ],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    /// Lists invoices of a company, newest first.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub async fn list_by_company(&self, company_id: Uuid) -> Result<Vec<invoices::Model>, DbErr> {
        invoices::Entity::find()
            .filter(invoices::Column::CompanyId.eq(company_id))
            .order_by_desc(invoices::Column::CreatedAt)
            .all(&self.db)
            .await
    }
}

/// Tax rates arrive either as a fraction (0.19) or a percent (19);
/// normalized to the fraction stored on the line.
fn normalize_rate(rate: Decimal) -> Decimal {
    if rate > Decimal::ONE {
        rate / Decimal::from(100)
    } else {
        rate
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
