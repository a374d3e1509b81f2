//! Invoice PDF rendering (graphic representation for the browser).

mod invoice;

pub use invoice::{render_invoice, InvoicePrintData, PdfError, PrintLine};
