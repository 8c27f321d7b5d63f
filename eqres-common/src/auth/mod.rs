//! Credential helpers
//!
//! Pure functions only. Session storage and the HTTP middleware live in
//! eqres-api; this module knows how to hash passwords and mint tokens.

pub mod password;
pub mod token;

pub use password::{hash_password, validate_password, validate_username, verify_password, PasswordHash};
pub use token::{generate_token, hash_token};
