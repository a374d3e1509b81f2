//! Shared types, errors, and configuration for Andino.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types with stable wire codes
//! - Configuration management (database, JWT, DIAN)
//! - JWT claims and token service

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod jwt_tests;

pub use auth::Claims;
pub use config::{AppConfig, DianAppEnv, DianConfig};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
