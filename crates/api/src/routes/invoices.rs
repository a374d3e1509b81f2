//! Invoice routes: creation (the intake of the DIAN pipeline), detail,
//! status polling and the PDF representation.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use andino_core::pdf::{render_invoice, InvoicePrintData, PrintLine};
use andino_db::entities::{invoice_lines, invoices};
use andino_db::repositories::{CreateInvoiceInput, InvoiceError, InvoiceLineInput};
use andino_db::{CompanyRepository, CustomerRepository, InvoiceRepository, ProductRepository, WarehouseRepository};
use andino_shared::auth::{ROLE_ADMIN, ROLE_SALESPERSON};

use crate::middleware::auth::AuthUser;
use crate::middleware::module::{ensure_module, module_is_active, MODULE_BILLING, MODULE_INVENTORY};
use crate::orchestrator;
use crate::routes::{error_response, internal_error};
use crate::AppState;

/// Creates the invoice router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", post(create_invoice).get(list_invoices))
        .route("/invoices/{id}", get(get_invoice))
        .route("/invoices/{id}/status", get(get_dian_status))
        .route("/invoices/{id}/pdf", get(download_pdf))
}

/// One requested line.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceLineRequest {
    /// Product id.
    pub product_id: Uuid,
    /// Quantity, > 0.
    pub quantity: Decimal,
    /// Unit price; omitted or zero defaults to the product price.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Request body for invoice creation.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Customer id.
    pub customer_id: Uuid,
    /// Warehouse to deduct from; required when the inventory module is
    /// active.
    #[serde(default)]
    pub warehouse_id: Option<Uuid>,
    /// Invoice prefix.
    pub prefix: String,
    /// Invoice number; omitted derives one from the prefix.
    #[serde(default)]
    pub number: Option<String>,
    /// Optional sales channel.
    #[serde(default)]
    pub channel_id: Option<Uuid>,
    /// Lines, non-empty.
    pub lines: Vec<CreateInvoiceLineRequest>,
}

/// Line slice of the invoice view.
#[derive(Debug, Serialize)]
pub struct InvoiceLineView {
    /// Line id.
    pub id: Uuid,
    /// Product id.
    pub product_id: Uuid,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Applied IVA fraction.
    pub tax_rate: Decimal,
    /// Line subtotal.
    pub subtotal: Decimal,
}

/// Invoice view returned by create/detail.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    /// Invoice id.
    pub id: Uuid,
    /// Customer id.
    pub customer_id: Uuid,
    /// Prefix.
    pub prefix: String,
    /// Number.
    pub number: String,
    /// Issue date (YYYY-MM-DD).
    pub date: String,
    /// Net total.
    pub net_total: Decimal,
    /// Tax total.
    pub tax_total: Decimal,
    /// Grand total.
    pub grand_total: Decimal,
    /// DIAN lifecycle status.
    pub dian_status: String,
    /// CUFE; empty until signed.
    pub cufe: String,
    /// QR payload; empty until signed.
    pub qr_data: String,
    /// Lines.
    pub lines: Vec<InvoiceLineView>,
}

/// POST /api/invoices - create a DRAFT invoice, deduct stock, dispatch the
/// DIAN orchestration, return immediately.
async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Response {
    if let Err(resp) = auth.require_role(&[ROLE_ADMIN, ROLE_SALESPERSON]) {
        return resp;
    }
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    if payload.prefix.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "VALIDATION", "prefix es obligatorio");
    }
    if payload.lines.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "la factura debe tener al menos una línea",
        );
    }

    let company_id = auth.company_id();

    // Customer must exist and belong to the tenant.
    let customer_repo = CustomerRepository::new((*state.db).clone());
    let customer = match customer_repo.find_by_id(payload.customer_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "cliente no encontrado")
        }
        Err(e) => {
            error!(error = %e, "customer lookup failed");
            return internal_error("error consultando el cliente");
        }
    };
    if customer.company_id != company_id {
        return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado al cliente");
    }

    // Inventory gating decides whether stock is deducted.
    let inventory_active = match module_is_active(&state, company_id, MODULE_INVENTORY).await {
        Ok(active) => active,
        Err(resp) => return resp,
    };
    let warehouse_id = if inventory_active {
        let Some(warehouse_id) = payload.warehouse_id else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                "warehouse_id es obligatorio con el módulo de inventario activo",
            );
        };
        let warehouse_repo = WarehouseRepository::new((*state.db).clone());
        match warehouse_repo.find_by_id(warehouse_id).await {
            Ok(Some(w)) if w.company_id == company_id => Some(warehouse_id),
            Ok(Some(_)) => {
                return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado a la bodega")
            }
            Ok(None) => {
                return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "bodega no encontrada")
            }
            Err(e) => {
                error!(error = %e, "warehouse lookup failed");
                return internal_error("error consultando la bodega");
            }
        }
    } else {
        None
    };

    // Products: existence, tenancy, quantities and price defaulting.
    let product_repo = ProductRepository::new((*state.db).clone());
    let mut lines = Vec::with_capacity(payload.lines.len());
    for line in &payload.lines {
        if line.quantity <= Decimal::ZERO {
            return error_response(
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                "la cantidad de cada línea debe ser positiva",
            );
        }
        let product = match product_repo.find_by_id(line.product_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "producto no encontrado")
            }
            Err(e) => {
                error!(error = %e, "product lookup failed");
                return internal_error("error consultando el producto");
            }
        };
        if product.company_id != company_id {
            return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado al producto");
        }

        let unit_price = match line.unit_price {
            Some(p) if p < Decimal::ZERO => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION",
                    "unit_price no puede ser negativo",
                )
            }
            Some(p) if !p.is_zero() => p,
            _ => product.price,
        };
        lines.push(InvoiceLineInput {
            product,
            quantity: line.quantity,
            unit_price,
        });
    }

    let invoice_repo = InvoiceRepository::new((*state.db).clone());
    let (invoice, line_models) = match invoice_repo
        .create_draft(CreateInvoiceInput {
            company_id,
            customer_id: customer.id,
            user_id: auth.user_id(),
            warehouse_id,
            prefix: payload.prefix.trim().to_string(),
            number: payload.number,
            channel_id: payload.channel_id,
            lines,
        })
        .await
    {
        Ok(created) => created,
        Err(InvoiceError::Duplicate(number)) => {
            return error_response(
                StatusCode::CONFLICT,
                "DUPLICATE",
                format!("ya existe la factura {number}"),
            )
        }
        Err(InvoiceError::InsufficientStock(sku)) => {
            return error_response(
                StatusCode::CONFLICT,
                "INSUFFICIENT_STOCK",
                format!("stock insuficiente para SKU '{sku}'"),
            )
        }
        Err(InvoiceError::InvalidInput(msg)) => {
            return error_response(StatusCode::BAD_REQUEST, "VALIDATION", msg)
        }
        Err(InvoiceError::Database(e)) => {
            error!(error = %e, "invoice creation failed");
            return internal_error("error creando la factura");
        }
    };

    info!(invoice_id = %invoice.id, company_id = %company_id, "invoice created as DRAFT");

    // Post-commit dispatch: the HTTP response returns the DRAFT view while
    // the orchestrator signs and submits in the background.
    if !state.dian.technical_key.is_empty() {
        orchestrator::dispatch(state.clone(), invoice.id);
    }

    (StatusCode::CREATED, Json(view(&invoice, &line_models))).into_response()
}

/// GET /api/invoices - list the company's invoices, newest first.
async fn list_invoices(State(state): State<AppState>, auth: AuthUser) -> Response {
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    let repo = InvoiceRepository::new((*state.db).clone());
    match repo.list_by_company(auth.company_id()).await {
        Ok(invoices) => {
            let views: Vec<InvoiceView> = invoices.iter().map(|i| view(i, &[])).collect();
            (StatusCode::OK, Json(serde_json::json!({ "invoices": views }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "invoice listing failed");
            internal_error("error consultando las facturas")
        }
    }
}

/// GET /api/invoices/{id} - full invoice view.
async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    let repo = InvoiceRepository::new((*state.db).clone());
    let invoice = match repo.find_by_id(id).await {
        Ok(Some(i)) => i,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "factura no encontrada")
        }
        Err(e) => {
            error!(error = %e, "invoice lookup failed");
            return internal_error("error consultando la factura");
        }
    };
    if invoice.company_id != auth.company_id() {
        return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado");
    }

    let lines = match repo.lines_of(id).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "invoice lines lookup failed");
            return internal_error("error consultando las líneas");
        }
    };

    (StatusCode::OK, Json(view(&invoice, &lines))).into_response()
}

/// GET /api/invoices/{id}/status - light polling read of the DIAN
/// lifecycle. Clients poll this until the status is terminal.
async fn get_dian_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    let repo = InvoiceRepository::new((*state.db).clone());
    match repo.get_dian_status(id).await {
        Ok(Some(row)) if row.company_id == auth.company_id() => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": row.id,
                "dian_status": row.dian_status.as_str(),
                "cufe": row.cufe.unwrap_or_default(),
                "track_id": row.track_id.unwrap_or_default(),
                "errors": row.dian_errors.unwrap_or_default(),
            })),
        )
            .into_response(),
        Ok(Some(_)) => error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado"),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "factura no encontrada"),
        Err(e) => {
            error!(error = %e, "status lookup failed");
            internal_error("error consultando el estado")
        }
    }
}

/// GET /api/invoices/{id}/pdf - inline PDF representation.
async fn download_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(resp) = ensure_module(&state, auth.company_id(), MODULE_BILLING).await {
        return resp;
    }

    let repo = InvoiceRepository::new((*state.db).clone());
    let invoice = match repo.find_by_id(id).await {
        Ok(Some(i)) => i,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "factura no encontrada")
        }
        Err(e) => {
            error!(error = %e, "invoice lookup failed");
            return internal_error("error consultando la factura");
        }
    };
    if invoice.company_id != auth.company_id() {
        return error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "acceso denegado");
    }

    let lines = match repo.lines_of(id).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "invoice lines lookup failed");
            return internal_error("error consultando las líneas");
        }
    };

    let company = match CompanyRepository::new((*state.db).clone())
        .find_by_id(invoice.company_id)
        .await
    {
        Ok(Some(c)) => c,
        _ => return internal_error("empresa de la factura no encontrada"),
    };
    let customer_name = CustomerRepository::new((*state.db).clone())
        .find_by_id(invoice.customer_id)
        .await
        .ok()
        .flatten()
        .map(|c| c.name)
        .unwrap_or_default();

    let product_repo = ProductRepository::new((*state.db).clone());
    let mut print_lines = Vec::with_capacity(lines.len());
    for line in &lines {
        let description = product_repo
            .find_by_id(line.product_id)
            .await
            .ok()
            .flatten()
            .map_or_else(|| format!("Producto {}", line.product_id), |p| p.name);
        print_lines.push(PrintLine {
            description,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
        });
    }

    let data = InvoicePrintData {
        company_name: company.name,
        company_nit: company.nit,
        invoice_id: format!("{}{}", invoice.prefix, invoice.number),
        issue_date: invoice.issue_date.format("%Y-%m-%d").to_string(),
        customer_name,
        lines: print_lines,
        net_total: invoice.net_total,
        tax_total: invoice.tax_total,
        grand_total: invoice.grand_total,
        cufe: invoice.cufe.clone().unwrap_or_default(),
        qr_data: invoice.qr_data.clone().unwrap_or_default(),
    };

    let filename = format!("{}{}.pdf", invoice.prefix, invoice.number);
    match render_invoice(&data, &state.fonts_dir) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(invoice_id = %id, error = %e, "PDF rendering failed");
            internal_error("no se pudo generar el PDF")
        }
    }
}

fn view(invoice: &invoices::Model, lines: &[invoice_lines::Model]) -> InvoiceView {
    InvoiceView {
        id: invoice.id,
        customer_id: invoice.customer_id,
        prefix: invoice.prefix.clone(),
        number: invoice.number.clone(),
        date: invoice.issue_date.format("%Y-%m-%d").to_string(),
        net_total: invoice.net_total,
        tax_total: invoice.tax_total,
        grand_total: invoice.grand_total,
        dian_status: invoice.dian_status.as_str().to_string(),
        cufe: invoice.cufe.clone().unwrap_or_default(),
        qr_data: invoice.qr_data.clone().unwrap_or_default(),
        lines: lines
            .iter()
            .map(|l| InvoiceLineView {
                id: l.id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
                tax_rate: l.tax_rate,
                subtotal: l.subtotal,
            })
            .collect(),
    }
}
