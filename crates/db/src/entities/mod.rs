//! `SeaORM` entity definitions.

pub mod billing_resolutions;
pub mod companies;
pub mod company_modules;
pub mod customers;
pub mod inventory_movements;
pub mod invoice_lines;
pub mod invoices;
pub mod products;
pub mod sales_channels;
pub mod sea_orm_active_enums;
pub mod stock;
pub mod users;
pub mod warehouses;
