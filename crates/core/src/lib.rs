//! Domain services for Andino.
//!
//! This crate holds everything that is pure logic or an outbound adapter and
//! does not touch the database:
//! - DIAN electronic invoicing: CUFE fingerprint, NIT validation, UBL 2.1 XML
//!   construction, XAdES-EPES signing, ZIP packaging, SOAP submission
//! - Inventory cost accounting (weighted average)
//! - Password hashing
//! - Invoice PDF rendering

pub mod auth;
pub mod dian;
pub mod inventory;
pub mod pdf;
