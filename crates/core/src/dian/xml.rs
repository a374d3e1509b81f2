//! UBL 2.1 invoice XML construction.
//!
//! Emits the `<Invoice>` document the signer and the DIAN web service expect.
//! The first child is always `<ext:UBLExtensions>` with exactly two
//! extensions: the DIAN resolution block (or an empty slot when the company
//! has no active resolution) and an empty slot into which the signer injects
//! `<ds:Signature>`. That ordering is positional and load-bearing.

use chrono::{DateTime, FixedOffset, NaiveDate};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use super::{
    format_amount, only_digits, PAYMENT_FORM_CONTADO, PAYMENT_FORM_CREDITO,
    PAYMENT_METHOD_EFECTIVO, TAX_CODE_IVA, UNIT_UNIT,
};

// ── Namespaces (UBL 2.1 + DIAN) ──────────────────────────────────────────────

/// Default namespace (UBL Invoice).
pub const NS_INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
/// Common Aggregate Components.
pub const NS_CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
/// Common Basic Components.
pub const NS_CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
/// Extension Components.
pub const NS_EXT: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
/// DIAN extensions.
pub const NS_STS: &str = "dian:gov:co:facturaelectronica:v1";
/// XML Digital Signature.
pub const NS_DS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XAdES.
pub const NS_XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";
/// XML Schema Instance.
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Schema location for the UBL 2.1 Invoice.
pub const SCHEMA_LOCATION_INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2 http://docs.oasis-open.org/ubl/os-UBL-2.1/xsd/maindoc/UBL-Invoice-2.1.xsd";

/// `Id` attribute of the root element; the signature Reference points here.
pub const INVOICE_ELEMENT_ID: &str = "invoice-id";

/// XML construction errors.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Snapshot is missing a mandatory piece.
    #[error("faltan datos para construir el XML: {0}")]
    MissingData(String),
    /// Serialization failure from the XML writer.
    #[error("error escribiendo XML: {0}")]
    Write(String),
}

impl From<std::io::Error> for XmlError {
    fn from(e: std::io::Error) -> Self {
        Self::Write(e.to_string())
    }
}

// ── Frozen snapshot types ────────────────────────────────────────────────────

/// A party (supplier or customer) as it appears in the document.
#[derive(Debug, Clone)]
pub struct PartyData {
    /// Registered name.
    pub name: String,
    /// Tax id as stored (digits are extracted on write).
    pub tax_id: String,
    /// Identification scheme: "31" NIT, "13" CC.
    pub id_type_code: String,
    /// Street address, when known.
    pub address: Option<String>,
}

/// Active billing-resolution data for the DIAN extension block.
#[derive(Debug, Clone)]
pub struct ResolutionData {
    /// Resolution number (e.g. "18764000000001").
    pub number: String,
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
}

/// One invoice line enriched with product data.
#[derive(Debug, Clone)]
pub struct LineData {
    /// Item description (product name).
    pub description: String,
    /// Seller item code (SKU).
    pub seller_code: String,
    /// DIAN unit code; empty falls back to "94" (unit).
    pub unit_code: String,
    /// Invoiced quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line subtotal (quantity × unit price).
    pub subtotal: Decimal,
}

/// Everything the builder needs, frozen from the database.
#[derive(Debug, Clone)]
pub struct InvoiceSnapshot {
    /// Invoice prefix.
    pub prefix: String,
    /// Invoice number.
    pub number: String,
    /// CUFE (goes into `<cbc:UUID>`); empty omits the element.
    pub uuid: String,
    /// Issue timestamp in the process time zone.
    pub issue_date: DateTime<FixedOffset>,
    /// Net total.
    pub net_total: Decimal,
    /// Tax total.
    pub tax_total: Decimal,
    /// Grand total.
    pub grand_total: Decimal,
    /// Supplier (the company).
    pub supplier: PartyData,
    /// Customer.
    pub customer: PartyData,
    /// Active resolution; `None` leaves the first extension slot empty.
    pub resolution: Option<ResolutionData>,
    /// Payment form: "1" contado, "2" crédito. Empty defaults to contado.
    pub payment_form_code: String,
    /// Payment method code. Empty defaults to "10" (efectivo).
    pub payment_method_code: String,
    /// Due date; required for credit.
    pub due_date: Option<NaiveDate>,
    /// Lines, in order.
    pub lines: Vec<LineData>,
}

/// Builds the UBL 2.1 invoice document.
#[derive(Debug, Clone, Copy, Default)]
pub struct UblBuilder;

impl UblBuilder {
    /// Creates the builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates the unindented UTF-8 document for the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] when mandatory data is missing or serialization
    /// fails.
    pub fn build(&self, snap: &InvoiceSnapshot) -> Result<String, XmlError> {
        if snap.supplier.name.is_empty() {
            return Err(XmlError::MissingData("razón social del emisor".into()));
        }
        if snap.customer.name.is_empty() {
            return Err(XmlError::MissingData("nombre del adquiriente".into()));
        }
        if snap.lines.is_empty() {
            return Err(XmlError::MissingData("la factura no tiene líneas".into()));
        }

        let mut w = Writer::new(std::io::Cursor::new(Vec::new()));
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("Invoice");
        root.push_attribute(("Id", INVOICE_ELEMENT_ID));
        root.push_attribute(("xmlns", NS_INVOICE));
        root.push_attribute(("xmlns:cac", NS_CAC));
        root.push_attribute(("xmlns:cbc", NS_CBC));
        root.push_attribute(("xmlns:ds", NS_DS));
        root.push_attribute(("xmlns:ext", NS_EXT));
        root.push_attribute(("xmlns:sts", NS_STS));
        root.push_attribute(("xmlns:xades", NS_XADES));
        root.push_attribute(("xmlns:xsi", NS_XSI));
        root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION_INVOICE));
        w.write_event(Event::Start(root))?;

        // ext:UBLExtensions must be the first child; the signer locates the
        // second ExtensionContent by position.
        write_extensions(&mut w, snap.resolution.as_ref())?;

        let invoice_id = format!("{}{}", snap.prefix.trim(), snap.number.trim());
        text(&mut w, "cbc:UBLVersionID", "2.1")?;
        text(&mut w, "cbc:CustomizationID", "10")?;
        text(&mut w, "cbc:ProfileID", "DIAN 2.1: Factura Electrónica de Venta")?;
        text(&mut w, "cbc:ID", &invoice_id)?;
        if !snap.uuid.is_empty() {
            text(&mut w, "cbc:UUID", &snap.uuid)?;
        }
        text(&mut w, "cbc:IssueDate", &snap.issue_date.format("%Y-%m-%d").to_string())?;
        text(&mut w, "cbc:IssueTime", &snap.issue_date.format("%H:%M:%S%:z").to_string())?;
        text(&mut w, "cbc:DocumentCurrencyCode", "COP")?;
        text(&mut w, "cbc:LineCountNumeric", &snap.lines.len().to_string())?;
        if let Some(due) = snap.due_date {
            text(&mut w, "cbc:DueDate", &due.format("%Y-%m-%d").to_string())?;
        }

        write_party(&mut w, "cac:AccountingSupplierParty", &snap.supplier)?;
        write_party(&mut w, "cac:AccountingCustomerParty", &snap.customer)?;
        write_payment_means(&mut w, snap)?;
        write_tax_total(&mut w, snap)?;
        write_monetary_total(&mut w, snap)?;
        for (i, line) in snap.lines.iter().enumerate() {
            write_line(&mut w, i + 1, line)?;
        }

        w.write_event(Event::End(BytesEnd::new("Invoice")))?;

        let bytes = w.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
    }
}

type W = Writer<std::io::Cursor<Vec<u8>>>;

fn text(w: &mut W, name: &str, value: &str) -> Result<(), XmlError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_with_attr(
    w: &mut W,
    name: &str,
    value: &str,
    attr: (&str, &str),
) -> Result<(), XmlError> {
    let mut elem = BytesStart::new(name);
    elem.push_attribute(attr);
    w.write_event(Event::Start(elem))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn amount(w: &mut W, name: &str, value: Decimal) -> Result<(), XmlError> {
    text_with_attr(w, name, &format_amount(value), ("currencyID", "COP"))
}

fn open(w: &mut W, name: &str) -> Result<(), XmlError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn close(w: &mut W, name: &str) -> Result<(), XmlError> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Extension 1: DIAN resolution block (or empty content). Extension 2: empty
/// placeholder for the signature.
fn write_extensions(w: &mut W, resolution: Option<&ResolutionData>) -> Result<(), XmlError> {
    open(w, "ext:UBLExtensions")?;

    open(w, "ext:UBLExtension")?;
    open(w, "ext:ExtensionContent")?;
    if let Some(res) = resolution {
        open(w, "sts:DianExtensions")?;
        open(w, "sts:InvoiceControl")?;
        text(w, "sts:InvoiceAuthorization", &res.number)?;
        open(w, "sts:AuthorizationPeriod")?;
        text(w, "sts:StartDate", &res.date_from.format("%Y-%m-%d").to_string())?;
        text(w, "sts:EndDate", &res.date_to.format("%Y-%m-%d").to_string())?;
        close(w, "sts:AuthorizationPeriod")?;
        open(w, "sts:AuthorizedInvoices")?;
        text(w, "sts:Prefix", &res.prefix)?;
        text(w, "sts:From", &res.range_from.to_string())?;
        text(w, "sts:To", &res.range_to.to_string())?;
        close(w, "sts:AuthorizedInvoices")?;
        close(w, "sts:InvoiceControl")?;
        close(w, "sts:DianExtensions")?;
    }
    close(w, "ext:ExtensionContent")?;
    close(w, "ext:UBLExtension")?;

    open(w, "ext:UBLExtension")?;
    open(w, "ext:ExtensionContent")?;
    close(w, "ext:ExtensionContent")?;
    close(w, "ext:UBLExtension")?;

    close(w, "ext:UBLExtensions")?;
    Ok(())
}

fn write_party(w: &mut W, wrapper: &str, party: &PartyData) -> Result<(), XmlError> {
    open(w, wrapper)?;
    open(w, "cac:Party")?;

    open(w, "cac:PartyIdentification")?;
    text_with_attr(
        w,
        "cbc:ID",
        &only_digits(&party.tax_id),
        ("schemeID", scheme_id(&party.id_type_code)),
    )?;
    close(w, "cac:PartyIdentification")?;

    open(w, "cac:PartyName")?;
    text(w, "cbc:Name", &party.name)?;
    close(w, "cac:PartyName")?;

    if let Some(address) = party.address.as_deref().filter(|a| !a.is_empty()) {
        open(w, "cac:PostalAddress")?;
        text(w, "cbc:StreetName", address)?;
        close(w, "cac:PostalAddress")?;
    }

    close(w, "cac:Party")?;
    close(w, wrapper)?;
    Ok(())
}

fn scheme_id(code: &str) -> &'static str {
    match code {
        "13" => "13",
        _ => "31",
    }
}

fn write_payment_means(w: &mut W, snap: &InvoiceSnapshot) -> Result<(), XmlError> {
    let form = if snap.payment_form_code.is_empty() {
        PAYMENT_FORM_CONTADO
    } else {
        snap.payment_form_code.as_str()
    };
    let method = if snap.payment_method_code.is_empty() {
        PAYMENT_METHOD_EFECTIVO
    } else {
        snap.payment_method_code.as_str()
    };

    open(w, "cac:PaymentMeans")?;
    text(w, "cbc:PaymentMeansCode", method)?;
    if form == PAYMENT_FORM_CREDITO {
        let due = snap
            .due_date
            .ok_or_else(|| XmlError::MissingData("pago a crédito requiere fecha de vencimiento".into()))?;
        text(w, "cbc:PaymentDueDate", &due.format("%Y-%m-%d").to_string())?;
    }
    close(w, "cac:PaymentMeans")?;
    Ok(())
}

fn write_tax_total(w: &mut W, snap: &InvoiceSnapshot) -> Result<(), XmlError> {
    let percent = if snap.net_total > Decimal::ZERO {
        (snap.tax_total / snap.net_total * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_string()
    } else {
        "19".to_string()
    };

    open(w, "cac:TaxTotal")?;
    amount(w, "cbc:TaxAmount", snap.tax_total)?;
    open(w, "cac:TaxSubtotal")?;
    amount(w, "cbc:TaxableAmount", snap.net_total)?;
    amount(w, "cbc:TaxAmount", snap.tax_total)?;
    open(w, "cac:TaxCategory")?;
    text(w, "cbc:ID", TAX_CODE_IVA)?;
    text(w, "cbc:Percent", &percent)?;
    close(w, "cac:TaxCategory")?;
    close(w, "cac:TaxSubtotal")?;
    close(w, "cac:TaxTotal")?;
    Ok(())
}

fn write_monetary_total(w: &mut W, snap: &InvoiceSnapshot) -> Result<(), XmlError> {
    open(w, "cac:LegalMonetaryTotal")?;
    amount(w, "cbc:LineExtensionAmount", snap.net_total)?;
    amount(w, "cbc:TaxExclusiveAmount", snap.net_total)?;
    amount(w, "cbc:TaxInclusiveAmount", snap.grand_total)?;
    amount(w, "cbc:PayableAmount", snap.grand_total)?;
    close(w, "cac:LegalMonetaryTotal")?;
    Ok(())
}

fn write_line(w: &mut W, line_number: usize, line: &LineData) -> Result<(), XmlError> {
    let unit_code = if line.unit_code.is_empty() {
        UNIT_UNIT
    } else {
        line.unit_code.as_str()
    };

    open(w, "cac:InvoiceLine")?;
    text(w, "cbc:ID", &line_number.to_string())?;
    text_with_attr(
        w,
        "cbc:InvoicedQuantity",
        &format_amount(line.quantity),
        ("unitCode", unit_code),
    )?;
    amount(w, "cbc:LineExtensionAmount", line.subtotal)?;

    open(w, "cac:Item")?;
    let description = if line.description.is_empty() {
        format!("Item {line_number}")
    } else {
        line.description.clone()
    };
    text(w, "cbc:Description", &description)?;
    if !line.seller_code.is_empty() {
        open(w, "cac:SellersItemIdentification")?;
        text(w, "cbc:ID", &line.seller_code)?;
        close(w, "cac:SellersItemIdentification")?;
    }
    close(w, "cac:Item")?;

    open(w, "cac:Price")?;
    amount(w, "cbc:PriceAmount", line.unit_price)?;
    text_with_attr(w, "cbc:BaseQuantity", "1", ("unitCode", unit_code))?;
    close(w, "cac:Price")?;

    close(w, "cac:InvoiceLine")?;
    Ok(())
}
