//! Renders the printable representation of an invoice with `genpdf`.
//!
//! The layout mirrors the paper factura: company header, invoice id and
//! date, customer, line table, totals, and — once the document is signed —
//! the CUFE and a QR code pointing at the DIAN validation URL.

use genpdf::{elements, style, Alignment, Element, Scale};
use image::Luma;
use qrcode::QrCode;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::dian::format_amount;

/// PDF rendering errors.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Font directory missing or unreadable.
    #[error("fuentes no encontradas en {dir}: {reason}")]
    FontNotFound {
        /// Directory that was searched.
        dir: String,
        /// Underlying error description.
        reason: String,
    },
    /// Document rendering failed.
    #[error("error generando el PDF: {0}")]
    Render(String),
}

/// One printable line.
#[derive(Debug, Clone)]
pub struct PrintLine {
    /// Product name.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line subtotal.
    pub subtotal: Decimal,
}

/// Everything the renderer needs, already joined from the database.
#[derive(Debug, Clone)]
pub struct InvoicePrintData {
    /// Company (supplier) name.
    pub company_name: String,
    /// Company NIT as stored.
    pub company_nit: String,
    /// Composite invoice id (prefix + number).
    pub invoice_id: String,
    /// Issue date, already formatted `YYYY-MM-DD`.
    pub issue_date: String,
    /// Customer name.
    pub customer_name: String,
    /// Lines in order.
    pub lines: Vec<PrintLine>,
    /// Net total.
    pub net_total: Decimal,
    /// Tax total.
    pub tax_total: Decimal,
    /// Grand total.
    pub grand_total: Decimal,
    /// CUFE; empty before signing.
    pub cufe: String,
    /// QR payload; empty before signing.
    pub qr_data: String,
}

/// Renders the invoice PDF into memory.
///
/// `fonts_dir` must contain the Roboto family files (regular at minimum).
///
/// # Errors
///
/// Returns [`PdfError`] when fonts are missing or rendering fails.
pub fn render_invoice(data: &InvoicePrintData, fonts_dir: &str) -> Result<Vec<u8>, PdfError> {
    let font_family = genpdf::fonts::from_files(fonts_dir, "Roboto", None).map_err(|e| {
        PdfError::FontNotFound {
            dir: fonts_dir.to_string(),
            reason: e.to_string(),
        }
    })?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(format!("Factura {}", data.invoice_id));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    doc.push(
        elements::Paragraph::new(&data.company_name)
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    doc.push(
        elements::Paragraph::new(format!("NIT: {}", data.company_nit))
            .styled(style::Style::new().with_font_size(10)),
    );
    doc.push(elements::Break::new(1.5));

    doc.push(
        elements::Paragraph::new(format!("FACTURA ELECTRÓNICA DE VENTA {}", data.invoice_id))
            .styled(style::Style::new().bold().with_font_size(14)),
    );
    doc.push(elements::Paragraph::new(format!("Fecha: {}", data.issue_date)));
    doc.push(elements::Paragraph::new(format!("Cliente: {}", data.customer_name)));
    doc.push(elements::Break::new(2));

    let mut table = elements::TableLayout::new(vec![4, 1, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let bold = style::Style::new().bold();
    table
        .row()
        .element(elements::Paragraph::new("Producto").styled(bold))
        .element(elements::Paragraph::new("Cant.").styled(bold))
        .element(elements::Paragraph::new("Unitario").styled(bold))
        .element(elements::Paragraph::new("Subtotal").styled(bold))
        .push()
        .map_err(|e| PdfError::Render(e.to_string()))?;

    for line in &data.lines {
        table
            .row()
            .element(elements::Paragraph::new(&line.description))
            .element(elements::Paragraph::new(format_amount(line.quantity)))
            .element(elements::Paragraph::new(format!("$ {}", format_amount(line.unit_price))))
            .element(elements::Paragraph::new(format!("$ {}", format_amount(line.subtotal))))
            .push()
            .map_err(|e| PdfError::Render(e.to_string()))?;
    }
    doc.push(table);
    doc.push(elements::Break::new(1));

    for (label, value) in [
        ("Subtotal", data.net_total),
        ("IVA", data.tax_total),
        ("TOTAL", data.grand_total),
    ] {
        let mut paragraph =
            elements::Paragraph::new(format!("{label}: $ {}", format_amount(value)));
        paragraph.set_alignment(Alignment::Right);
        doc.push(paragraph.styled(style::Style::new().bold().with_font_size(11)));
    }

    if !data.cufe.is_empty() {
        doc.push(elements::Break::new(2));
        doc.push(
            elements::Paragraph::new(format!("CUFE: {}", data.cufe))
                .styled(style::Style::new().with_font_size(7)),
        );
    }

    if !data.qr_data.is_empty() {
        let code =
            QrCode::new(data.qr_data.as_bytes()).map_err(|e| PdfError::Render(e.to_string()))?;
        let buffer = code.render::<Luma<u8>>().build();
        let dynamic = image::DynamicImage::ImageLuma8(buffer);
        let qr_image = elements::Image::from_dynamic_image(dynamic)
            .map_err(|e| PdfError::Render(e.to_string()))?
            .with_scale(Scale::new(0.5, 0.5));
        doc.push(elements::Break::new(1));
        doc.push(qr_image);
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer)
        .map_err(|e| PdfError::Render(e.to_string()))?;
    Ok(buffer)
}
