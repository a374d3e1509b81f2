//! Request middleware: authentication, roles, module gating.

pub mod auth;
pub mod module;
