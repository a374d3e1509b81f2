//! Repository abstractions over the `SeaORM` entities.

pub mod company;
pub mod customer;
pub mod inventory;
pub mod invoice;
pub mod product;
pub mod resolution;
pub mod user;
pub mod warehouse;

pub use company::CompanyRepository;
pub use customer::CustomerRepository;
pub use inventory::{InventoryEngine, InventoryError, MovementInput};
pub use invoice::{CreateInvoiceInput, InvoiceError, InvoiceLineInput, InvoiceRepository};
pub use product::ProductRepository;
pub use resolution::ResolutionRepository;
pub use user::UserRepository;
pub use warehouse::WarehouseRepository;
