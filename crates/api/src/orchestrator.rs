//! DIAN orchestrator.
//!
//! One background task per invoice, dispatched after the creation
//! transaction commits:
//!
//! CUFE → XML UBL 2.1 → firma XAdES-EPES → ZIP → envío SOAP → update DB
//!
//! The task owns a fresh 30-second deadline independent of any HTTP request
//! lifetime. Transitions on `dian_status` are write-once per run: a task
//! that does not observe DRAFT on entry logs and returns without mutating.
//! Any build, signing, certificate or transport failure ends in
//! GENERATION_ERROR; REJECTED is reserved for a structured rejection from
//! DIAN. There are no automatic retries.

use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use andino_core::dian::cert::load_certificate;
use andino_core::dian::cufe::{calculate, CufeInput};
use andino_core::dian::signer::XadesSigner;
use andino_core::dian::soap::{SoapClient, SubmitTarget};
use andino_core::dian::xml::{
    InvoiceSnapshot, LineData, PartyData, ResolutionData, UblBuilder,
};
use andino_core::dian::zip::{dian_file_names, package_signed_xml};
use andino_core::dian::{format_amount, identification_type_for, TAX_CODE_IVA};
use andino_db::entities::invoices;
use andino_db::entities::sea_orm_active_enums::DianStatus;
use andino_db::repositories::invoice::DianUpdate;
use andino_db::{CompanyRepository, CustomerRepository, InvoiceRepository, ProductRepository, ResolutionRepository};
use andino_shared::DianAppEnv;

use crate::AppState;

/// Mock tracking id used in dev mode, where nothing leaves the process.
pub const MOCK_TRACK_ID: &str = "MOCK-TRACK-123";

/// Overall deadline for one orchestration run (steps 1–9 combined).
const ORCHESTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// QR validation URL (habilitación).
const QR_VALIDATION_URL_TEST: &str =
    "https://catalogo-vpfe-hab.dian.gov.co/document/searchqr?documentkey=";
/// QR validation URL (production).
const QR_VALIDATION_URL_PROD: &str =
    "https://catalogo-vpfe.dian.gov.co/document/searchqr?documentkey=";

/// Fire-and-forget dispatch of one orchestration task for `invoice_id`.
/// Called after the creation transaction commits, so the task observes a
/// visible DRAFT row.
pub fn dispatch(state: AppState, invoice_id: Uuid) {
    tokio::spawn(async move {
        match tokio::time::timeout(ORCHESTRATION_TIMEOUT, process(&state, invoice_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => {
                error!(invoice_id = %invoice_id, step = failure.step, "DIAN: {}", failure.message);
                mark_generation_error(&state, invoice_id, &failure).await;
            }
            Err(_) => {
                let failure = StepFailure::new(
                    "timeout",
                    "procesamiento DIAN cancelado: se agotó el presupuesto de 30 s",
                );
                error!(invoice_id = %invoice_id, "DIAN: {}", failure.message);
                mark_generation_error(&state, invoice_id, &failure).await;
            }
        }
    });
}

/// A failed step with its context; becomes the persisted `dian_errors`.
struct StepFailure {
    step: &'static str,
    message: String,
}

impl StepFailure {
    fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

async fn mark_generation_error(state: &AppState, invoice_id: Uuid, failure: &StepFailure) {
    let repo = InvoiceRepository::new((*state.db).clone());
    let update = DianUpdate {
        dian_errors: Some(format!("[{}] {}", failure.step, failure.message)),
        ..Default::default()
    };
    if let Err(e) = repo
        .update_dian(invoice_id, DianStatus::GenerationError, update)
        .await
    {
        error!(invoice_id = %invoice_id, error = %e, "could not persist GENERATION_ERROR");
    }
}

/// The synchronous core: re-fetch a frozen snapshot, compute the CUFE,
/// build and sign the XML, package, submit per environment, persist.
#[allow(clippy::too_many_lines)]
async fn process(state: &AppState, invoice_id: Uuid) -> Result<(), StepFailure> {
    let invoice_repo = InvoiceRepository::new((*state.db).clone());

    // ── 1. Frozen snapshot ───────────────────────────────────────────────
    // Re-read everything: the request task returned a view that may already
    // be stale.
    let invoice = match invoice_repo.find_by_id(invoice_id).await {
        Ok(Some(inv)) => inv,
        Ok(None) => {
            warn!(invoice_id = %invoice_id, "DIAN: invoice disappeared before orchestration");
            return Ok(());
        }
        Err(e) => return Err(StepFailure::new("fetch-invoice", e.to_string())),
    };
    if invoice.dian_status != DianStatus::Draft {
        // Idempotent re-dispatch: someone else already advanced it.
        info!(
            invoice_id = %invoice_id,
            status = invoice.dian_status.as_str(),
            "DIAN: unexpected status on entry, skipping"
        );
        return Ok(());
    }

    let company = CompanyRepository::new((*state.db).clone())
        .find_by_id(invoice.company_id)
        .await
        .map_err(|e| StepFailure::new("fetch-company", e.to_string()))?
        .ok_or_else(|| StepFailure::new("fetch-company", "empresa no encontrada"))?;

    let customer = CustomerRepository::new((*state.db).clone())
        .find_by_id(invoice.customer_id)
        .await
        .map_err(|e| StepFailure::new("fetch-customer", e.to_string()))?
        .ok_or_else(|| StepFailure::new("fetch-customer", "cliente no encontrado"))?;

    let resolution = ResolutionRepository::new((*state.db).clone())
        .get_active_by_company_and_prefix(invoice.company_id, &invoice.prefix)
        .await
        .map_err(|e| StepFailure::new("fetch-resolution", e.to_string()))?;

    let lines = invoice_repo
        .lines_of(invoice_id)
        .await
        .map_err(|e| StepFailure::new("fetch-lines", e.to_string()))?;

    let product_repo = ProductRepository::new((*state.db).clone());
    let mut line_data = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = product_repo
            .find_by_id(line.product_id)
            .await
            .map_err(|e| StepFailure::new("fetch-products", e.to_string()))?;
        let (description, seller_code, unit_code) = match product {
            Some(p) => (p.name, p.sku, p.unit_measure),
            None => (
                format!("Producto {}", line.product_id),
                line.product_id.to_string(),
                String::new(),
            ),
        };
        line_data.push(LineData {
            description,
            seller_code,
            unit_code,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
        });
    }

    // ── 2. CUFE ──────────────────────────────────────────────────────────
    let technical_key = resolution
        .as_ref()
        .map(|r| r.technical_key.clone())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| state.dian.technical_key.clone());
    let environment = if state.dian.environment.is_empty() {
        "2".to_string()
    } else {
        state.dian.environment.clone()
    };

    let number = format!("{}{}", invoice.prefix.trim(), invoice.number.trim());
    let cufe = calculate(&CufeInput {
        number: number.clone(),
        issue_date: invoice.issue_date.format("%Y-%m-%d").to_string(),
        net_total: invoice.net_total,
        iva_total: invoice.tax_total,
        inc_total: rust_decimal::Decimal::ZERO,
        ica_total: rust_decimal::Decimal::ZERO,
        grand_total: invoice.grand_total,
        supplier_nit: company.nit.clone(),
        customer_doc: customer.tax_id.clone(),
        technical_key,
        environment: environment.clone(),
    })
    .map_err(|e| StepFailure::new("cufe", e.to_string()))?;

    // ── 3. XML UBL 2.1 ───────────────────────────────────────────────────
    let snapshot = InvoiceSnapshot {
        prefix: invoice.prefix.clone(),
        number: invoice.number.clone(),
        uuid: cufe.clone(),
        issue_date: invoice.issue_date,
        net_total: invoice.net_total,
        tax_total: invoice.tax_total,
        grand_total: invoice.grand_total,
        supplier: PartyData {
            name: company.name.clone(),
            tax_id: company.nit.clone(),
            id_type_code: "31".to_string(),
            address: company.address.clone(),
        },
        customer: PartyData {
            name: customer.name.clone(),
            tax_id: customer.tax_id.clone(),
            id_type_code: identification_type_for(&customer.tax_id).to_string(),
            address: None,
        },
        resolution: resolution.as_ref().map(|r| ResolutionData {
            number: r.resolution_number.clone(),
            prefix: r.prefix.clone(),
            range_from: r.range_from,
            range_to: r.range_to,
            date_from: r.date_from,
            date_to: r.date_to,
        }),
        payment_form_code: String::new(),
        payment_method_code: String::new(),
        due_date: None,
        lines: line_data,
    };
    let xml = UblBuilder::new()
        .build(&snapshot)
        .map_err(|e| StepFailure::new("xml-build", e.to_string()))?;

    // ── 4. Certificate ───────────────────────────────────────────────────
    let cert = load_certificate(
        &state.dian.cert_path,
        &state.dian.cert_key_path,
        &state.dian.cert_password,
    )
    .map_err(|e| StepFailure::new("cert-load", e.to_string()))?;

    // ── 5. XAdES-EPES signature → SIGNED ─────────────────────────────────
    let signed_xml = XadesSigner::new()
        .sign(&xml, &cert)
        .map_err(|e| StepFailure::new("xml-sign", e.to_string()))?;

    let qr_data = build_qr(&invoice, &number, &cufe, &environment);
    invoice_repo
        .update_dian(
            invoice_id,
            DianStatus::Signed,
            DianUpdate {
                cufe: Some(cufe.clone()),
                uuid: Some(cufe.clone()),
                xml_signed: Some(signed_xml.clone()),
                qr_data: Some(qr_data),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| StepFailure::new("persist-signed", e.to_string()))?;

    // ── 6. ZIP ───────────────────────────────────────────────────────────
    let (xml_name, zip_name) = dian_file_names(&company.nit, &invoice.prefix, &invoice.number);
    let zip_bytes = package_signed_xml(signed_xml.as_bytes(), &xml_name)
        .map_err(|e| StepFailure::new("zip", e.to_string()))?;

    // ── 7–8. Conditional submission ──────────────────────────────────────
    let app_env = DianAppEnv::parse(&state.dian.app_env).ok_or_else(|| {
        StepFailure::new(
            "config",
            format!("DIAN_APP_ENV desconocido: {:?} (usar dev|test|prod)", state.dian.app_env),
        )
    })?;

    let (final_status, track_id, dian_errors) = match app_env {
        DianAppEnv::Dev => {
            info!(
                invoice_id = %invoice_id,
                zip = %zip_name,
                bytes = zip_bytes.len(),
                "DIAN [dev]: simulating submission"
            );
            (DianStatus::Accepted, MOCK_TRACK_ID.to_string(), String::new())
        }
        DianAppEnv::Test | DianAppEnv::Prod => {
            let target = if app_env == DianAppEnv::Prod {
                SubmitTarget::Produccion
            } else {
                SubmitTarget::Habilitacion
            };
            let client =
                SoapClient::new().map_err(|e| StepFailure::new("soap", e.to_string()))?;
            let outcome = client
                .submit(&zip_bytes, &zip_name, target)
                .await
                .map_err(|e| StepFailure::new("soap", e.to_string()))?;

            if outcome.accepted {
                info!(invoice_id = %invoice_id, track_id = %outcome.track_id, "DIAN: accepted");
                (DianStatus::Accepted, outcome.track_id, outcome.errors)
            } else {
                warn!(invoice_id = %invoice_id, errors = %outcome.errors, "DIAN: rejected");
                (DianStatus::Rejected, outcome.track_id, outcome.errors)
            }
        }
    };

    // ── 9. Terminal persist ──────────────────────────────────────────────
    invoice_repo
        .update_dian(
            invoice_id,
            final_status.clone(),
            DianUpdate {
                track_id: Some(track_id.clone()).filter(|t| !t.is_empty()),
                dian_errors: Some(dian_errors).filter(|e| !e.is_empty()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| StepFailure::new("persist-final", e.to_string()))?;

    info!(
        invoice_id = %invoice_id,
        status = final_status.as_str(),
        track_id = %track_id,
        "DIAN: processed"
    );
    Ok(())
}

/// QR payload: `numFac|fecFac|valFac|01|valImp|CUFE|url+CUFE`, with the
/// validation URL picked by environment.
fn build_qr(invoice: &invoices::Model, number: &str, cufe: &str, environment: &str) -> String {
    let base = if environment == "1" {
        QR_VALIDATION_URL_PROD
    } else {
        QR_VALIDATION_URL_TEST
    };
    [
        number.to_string(),
        invoice.issue_date.format("%Y-%m-%d").to_string(),
        format_amount(invoice.grand_total),
        TAX_CODE_IVA.to_string(),
        format_amount(invoice.tax_total),
        cufe.to_string(),
        format!("{base}{cufe}"),
    ]
    .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sample_invoice() -> invoices::Model {
        invoices::Model {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            channel_id: None,
            prefix: "SETP".to_string(),
            number: "990000001".to_string(),
            issue_date: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 15, 10, 0, 0)
                .unwrap(),
            net_total: dec!(1000000),
            tax_total: dec!(190000),
            grand_total: dec!(1190000),
            dian_status: DianStatus::Signed,
            cufe: None,
            uuid: None,
            xml_signed: None,
            qr_data: None,
            track_id: None,
            dian_errors: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn qr_follows_the_pipe_layout() {
        let cufe = "ab".repeat(48);
        let qr = build_qr(&sample_invoice(), "SETP990000001", &cufe, "2");
        let parts: Vec<&str> = qr.split('|').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0], "SETP990000001");
        assert_eq!(parts[1], "2024-03-15");
        assert_eq!(parts[2], "1190000.00");
        assert_eq!(parts[3], "01");
        assert_eq!(parts[4], "190000.00");
        assert_eq!(parts[5], cufe);
        assert!(parts[6].starts_with(QR_VALIDATION_URL_TEST));
        assert!(parts[6].ends_with(&cufe));
    }

    #[test]
    fn qr_url_switches_with_environment() {
        let cufe = "cd".repeat(48);
        let qr_prod = build_qr(&sample_invoice(), "SETP990000001", &cufe, "1");
        assert!(qr_prod.contains(QR_VALIDATION_URL_PROD));
        let qr_test = build_qr(&sample_invoice(), "SETP990000001", &cufe, "2");
        assert!(qr_test.contains(QR_VALIDATION_URL_TEST));
    }
}
