//! Salted password hashing
//!
//! Passwords are stored as `SHA-256^n(salt || password)` with a random
//! 16-byte salt. Both halves are hex encoded into the `users.password_hash`
//! and `users.password_salt` columns.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash stretching rounds
const HASH_ROUNDS: u32 = 10_000;

const SALT_LEN: usize = 16;

/// Minimum password length accepted at registration or change
pub const MIN_PASSWORD_LEN: usize = 8;

/// Stored password hash with its salt (both hex)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = to_hex(&salt);
    let hash = derive(password, &salt);
    PasswordHash { hash, salt }
}

/// Check a password against a stored hash and salt
///
/// Comparison is constant time. An empty stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str, salt: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let candidate = derive(password, salt);
    candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// Validate a username: 3-32 chars of `[A-Za-z0-9_.-]`
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err("Username must be 3-32 characters".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err("Username may only contain letters, digits, '_', '.' and '-'".to_string());
    }
    Ok(())
}

/// Validate a new password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

fn derive(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::digest(digest);
    }
    format!("{:x}", digest)
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
