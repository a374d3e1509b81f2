//! Password hashing with Argon2id.

mod password;

pub use password::{hash_password, verify_password, PasswordError};
