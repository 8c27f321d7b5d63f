//! UUID utilities

use uuid::Uuid;

/// Parse a UUID read back from a TEXT column
///
/// Rows are only ever written with `Uuid::to_string`, so a parse failure
/// means the database was edited by hand.
pub fn parse_column(s: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| crate::Error::Internal(format!("Corrupt UUID '{}': {}", s, e)))
}
