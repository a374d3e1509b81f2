//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access, including the transactional
//!   inventory engine
//! - Database migrations (tables, triggers, indexes)

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    CompanyRepository, CustomerRepository, InventoryEngine, InvoiceRepository, ProductRepository,
    ResolutionRepository, UserRepository, WarehouseRepository,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options.max_connections(max_connections);
    Database::connect(options).await
}
